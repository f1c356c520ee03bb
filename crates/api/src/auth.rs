//! Bearer-token authentication.
//!
//! Tokens are issued elsewhere; this service only verifies them and turns the
//! claims into an [`Identity`] that is passed explicitly into every workflow
//! call.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use common::{Identity, Role, UserId};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use store::CommerceStore;
use thiserror::Error;

use crate::error::ApiError;
use crate::routes::AppState;

/// Why a request could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access denied. No token provided.")]
    MissingToken,

    #[error("Invalid authorization header")]
    MalformedHeader,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Resolves a bearer token to the caller's identity.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// `customer` (or `user`) or `admin`.
    pub role: String,
    pub exp: i64,
}

impl TryFrom<Claims> for Identity {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id: UserId = claims
            .sub
            .parse()
            .map_err(|e| AuthError::InvalidToken(format!("bad subject: {e}")))?;
        let role: Role = claims.role.parse().map_err(AuthError::InvalidToken)?;
        Ok(Identity { user_id, role })
    }
}

/// HS256 JWT verification with a shared secret.
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a token for `identity` that expires after `ttl`.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: identity.user_id.to_string(),
            role: identity.role.as_str().to_string(),
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn identify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;
        Identity::try_from(data.claims)
    }
}

/// The authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl<S: CommerceStore + 'static> FromRequestParts<Arc<AppState<S>>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MalformedHeader)?;

        match state.identity.identify(token) {
            Ok(identity) => Ok(Caller(identity)),
            Err(e) => {
                tracing::warn!(error = %e, uri = %parts.uri, "authentication failed");
                Err(e.into())
            }
        }
    }
}
