//! API middleware.

#![allow(missing_docs)]

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use gophersocial_common::{AppError, AppResult, Config};
use gophersocial_core::{
    CommentService, FollowingService, JwtAuthenticator, Mailer, PostService,
    RegistrationService, RoleService, UserCache, UserService,
};
use gophersocial_db::Storage;
use subtle::ConstantTimeEq;
use tracing::{debug, error};

use crate::extractors::{AuthUser, ClientIp, CurrentPost, PathId};
use crate::rate_limit::FixedWindowLimiter;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub authenticator: JwtAuthenticator,
    pub user_service: UserService,
    pub registration_service: RegistrationService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub following_service: FollowingService,
    pub role_service: RoleService,
    pub rate_limiter: FixedWindowLimiter,
}

impl AppState {
    /// Wire every service over `storage`. `cache` is `None` when caching is off.
    #[must_use]
    pub fn new(
        config: Config,
        storage: Storage,
        cache: Option<Arc<dyn UserCache>>,
        mailer: Mailer,
    ) -> Self {
        let Storage {
            users,
            posts,
            comments,
            followers,
            roles,
        } = storage;

        Self {
            authenticator: JwtAuthenticator::from_config(&config.auth.token),
            user_service: UserService::new(users.clone(), cache),
            registration_service: RegistrationService::new(
                users,
                mailer,
                &config.server.frontend_url,
                config.mail.invitation_ttl(),
                config.mail_sandbox(),
            ),
            post_service: PostService::new(posts.clone(), comments.clone()),
            comment_service: CommentService::new(comments, posts),
            following_service: FollowingService::new(followers),
            role_service: RoleService::new(roles),
            rate_limiter: FixedWindowLimiter::from_config(&config.rate_limiter),
            config: Arc::new(config),
        }
    }
}

/// Derive the client address and store it as [`ClientIp`].
///
/// Proxy headers win over the socket peer, in the order `True-Client-IP`,
/// `X-Real-IP`, then the first `X-Forwarded-For` entry.
pub async fn real_ip_middleware(mut req: Request<Body>, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = forwarded_ip(req.headers()).or(peer);

    req.extensions_mut().insert(ClientIp(ip));
    next.run(req).await
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("true-client-ip")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| header_ip("x-forwarded-for"))
}

/// Bearer authentication middleware.
///
/// Any failure is `Unauthorized`; handlers below never see a partial user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?;

    let user_id = state.authenticator.validate_token(token)?;
    let user = state.user_service.get(user_id).await.map_err(|e| {
        if e.is_server_error() {
            error!(user_id, error = %e, "Failed to load authenticated user");
        } else {
            debug!(user_id, error = %e, "Token subject is not an active user");
        }
        AppError::Unauthorized("unauthorized".to_string())
    })?;

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("authorization header is missing".to_string()))?;

    let malformed = || AppError::Unauthorized("authorization header is malformed".to_string());
    let value = value.to_str().map_err(|_| malformed())?;
    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() => Ok(token),
        _ => Err(malformed()),
    }
}

/// Load the post named by `{id}` with its comments and store it as [`CurrentPost`].
pub async fn load_post_middleware(
    State(state): State<AppState>,
    PathId(post_id): PathId,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let post = state.post_service.get_with_comments(post_id).await?;

    req.extensions_mut().insert(CurrentPost(post));
    Ok(next.run(req).await)
}

/// Owner or at least a moderator.
pub async fn require_moderator_or_owner(
    State(state): State<AppState>,
    user: AuthUser,
    post: CurrentPost,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authorize_post(&state, &user, &post, "moderator").await?;
    Ok(next.run(req).await)
}

/// Owner or an admin.
pub async fn require_admin_or_owner(
    State(state): State<AppState>,
    user: AuthUser,
    post: CurrentPost,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authorize_post(&state, &user, &post, "admin").await?;
    Ok(next.run(req).await)
}

async fn authorize_post(
    state: &AppState,
    AuthUser(user): &AuthUser,
    CurrentPost(post): &CurrentPost,
    required: &str,
) -> AppResult<()> {
    state
        .role_service
        .authorize(user, post.post.user_id, required)
        .await
}

/// HTTP Basic authentication against the configured credentials.
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let basic = &state.config.auth.basic;
    let authorized = basic_credentials(req.headers()).is_some_and(|(user, pass)| {
        credentials_match(&user, &pass, &basic.username, &basic.password)
    });

    if authorized {
        return next.run(req).await;
    }

    let mut response = AppError::Unauthorized("unauthorized".to_string()).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Basic realm="restricted", charset="UTF-8""#),
    );
    response
}

/// Compare both fields in constant time, whatever the first one yields.
fn credentials_match(user: &str, pass: &str, expected_user: &str, expected_pass: &str) -> bool {
    let user_ok = user.as_bytes().ct_eq(expected_user.as_bytes());
    let pass_ok = pass.as_bytes().ct_eq(expected_pass.as_bytes());
    (user_ok & pass_ok).into()
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(BASE64.decode(encoded).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_ip_precedence() {
        let map = headers(&[
            ("x-forwarded-for", "10.0.0.3, 10.0.0.4"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(forwarded_ip(&map), Some("10.0.0.2".parse().unwrap()));

        let map = headers(&[("x-forwarded-for", "10.0.0.3, 10.0.0.4")]);
        assert_eq!(forwarded_ip(&map), Some("10.0.0.3".parse().unwrap()));

        assert_eq!(forwarded_ip(&headers(&[("x-real-ip", "garbage")])), None);
    }

    #[test]
    fn test_bearer_token() {
        let map = headers(&[("authorization", "Bearer abc.def")]);
        assert_eq!(bearer_token(&map).unwrap(), "abc.def");
    }

    #[test]
    fn test_bearer_token_errors() {
        let missing = bearer_token(&HeaderMap::new()).unwrap_err();
        assert_eq!(missing.to_string(), "authorization header is missing");

        for bad in ["Token abc", "Bearer", "Bearer ", "bearer abc"] {
            let map = headers(&[("authorization", bad)]);
            let err = bearer_token(&map).unwrap_err();
            assert_eq!(err.to_string(), "authorization header is malformed");
        }
    }

    #[test]
    fn test_credentials_match() {
        assert!(credentials_match("admin", "secret", "admin", "secret"));
        assert!(!credentials_match("admin", "secreT", "admin", "secret"));
        assert!(!credentials_match("admin", "secret-longer", "admin", "secret"));
        assert!(!credentials_match("root", "secret", "admin", "secret"));
        assert!(!credentials_match("", "", "admin", "secret"));
    }

    #[test]
    fn test_basic_credentials() {
        // admin:secret
        let map = headers(&[("authorization", "Basic YWRtaW46c2VjcmV0")]);
        assert_eq!(
            basic_credentials(&map),
            Some(("admin".to_string(), "secret".to_string()))
        );

        let map = headers(&[("authorization", "Basic not-base64!")]);
        assert_eq!(basic_credentials(&map), None);
    }
}
