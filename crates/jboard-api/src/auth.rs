//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs minted by the auth service with the shared
//! `JWT_SECRET`. The [`AuthUser`] extractor rejects requests without a
//! valid token; handlers that take it are authenticated by construction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jboard_models::{Principal, Role};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Role name, either "professional-body" or "worker".
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Validates access tokens against the shared signing secret.
pub struct TokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if secret.is_empty() {
            anyhow::bail!("JWT_SECRET must be set");
        }
        Ok(Self::new(secret.as_bytes()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {e}")))?;
        Ok(data.claims)
    }
}

/// Authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn principal(&self) -> Principal {
        Principal::new(self.id.clone(), self.role)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.verifier.verify(token)?;
        let role = Role::from_str(&claims.role)
            .ok_or_else(|| ApiError::unauthorized(format!("Unknown role: {}", claims.role)))?;

        Ok(AuthUser {
            id: claims.sub,
            role,
        })
    }
}
