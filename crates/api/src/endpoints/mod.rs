//! API endpoints.

mod authentication;
mod comments;
mod debug;
mod health;
mod posts;
mod users;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, put},
};

use crate::middleware::{AppState, auth_middleware, basic_auth_middleware};

/// Create the `/v1` router.
///
/// Everything except health, registration, token issuing, activation and the
/// basic-auth diagnostics requires a bearer token.
pub fn router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .nest("/authentication", authentication::router())
        .route("/users/activate/{token}", put(users::activate))
        .route(
            "/debug/vars",
            get(debug::vars).route_layer(from_fn_with_state(state.clone(), basic_auth_middleware)),
        );

    let protected = Router::new()
        .nest("/users", users::router())
        .nest("/posts", posts::router(state))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    public.merge(protected)
}
