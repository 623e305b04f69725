//! Bearer token issuing and validation.

use std::time::Duration;

use chrono::Utc;
use gophersocial_common::{AppError, AppResult, config::TokenConfig};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Token claims. Unknown claims are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// HS256 token issuer and validator.
///
/// The audience equals the issuer. No clock skew is tolerated.
#[derive(Clone)]
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    expiry: Duration,
}

impl JwtAuthenticator {
    #[must_use]
    pub fn new(secret: &str, issuer: &str, expiry: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            expiry,
        }
    }

    #[must_use]
    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(&config.secret, &config.issuer, config.expiry())
    }

    /// Mint a token for `user_id`.
    pub fn generate_token(&self, user_id: i64) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + self.expiry.as_secs() as i64,
            iat: now,
            nbf: now,
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify a token and return the user id it was issued for.
    pub fn validate_token(&self, token: &str) -> AppResult<i64> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "nbf", "iss", "aud"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| AppError::Unauthorized(format!("invalid token: {e}")))?
            .claims;

        let now = Utc::now().timestamp();
        if claims.iat > now {
            return Err(AppError::Unauthorized("token issued in the future".to_string()));
        }
        if now >= claims.exp {
            return Err(AppError::Unauthorized("token has expired".to_string()));
        }

        claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("invalid token subject".to_string()))
    }
}
