/// Access Guard
///
/// Stateless per-request gate: extracts a bearer token from an
/// `Authorization` header value and verifies it with the access key.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::claims::AccessClaims;
use crate::auth::jwt::TokenCodec;
use crate::error::AuthError;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone)]
pub struct AccessGuard {
    codec: Arc<TokenCodec>,
}

impl AccessGuard {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    pub fn authenticate_request(&self, header: Option<&str>) -> Result<AccessClaims, AuthError> {
        self.authenticate_request_at(header, Utc::now())
    }

    /// Verify the raw `Authorization` header value
    ///
    /// # Errors
    /// - `MissingToken` if the header is absent or empty
    /// - `MalformedHeader` unless it is exactly `Bearer <token>`
    /// - `InvalidOrExpiredToken` if the token fails verification
    pub fn authenticate_request_at(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, AuthError> {
        let header = match header {
            Some(value) if !value.is_empty() => value,
            _ => return Err(AuthError::MissingToken),
        };

        let token = extract_bearer(header)?;

        self.codec.verify_access_at(token, now).map_err(|e| {
            tracing::warn!(error = %e, "Access token rejected");
            AuthError::InvalidOrExpiredToken
        })
    }
}

/// `Bearer <token>` with exactly one space and a token without whitespace
fn extract_bearer(header: &str) -> Result<&str, AuthError> {
    match header.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.is_empty() && !token.contains(char::is_whitespace) => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}
