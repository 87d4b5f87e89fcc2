/// Refresh Token Analysis
///
/// Decides whether a presented refresh token may mint a new access token.
/// A presented token is evaluated in this order:
/// 1. Unknown to the store -> `UnknownToken` error
/// 2. Stored as invalid -> `Blacklisted` outcome
/// 3. Bad signature, algorithm or shape -> `MalformedToken` error
/// 4. Expired -> record invalidated, `Expired` outcome
/// 5. Otherwise -> a new access token; the refresh token is not rotated
///
/// The validity flag is checked before any claim is trusted, so a revoked
/// token is rejected even while its signature is still good.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::auth::jwt::TokenCodec;
use crate::error::{AppError, AuthError, StoreError, TokenError};
use crate::store::{with_deadline, RefreshTokenStore};
use crate::telemetry::token_fingerprint;

/// Successful result of a refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { access_token: String },
    /// The token was revoked by logout, a later login or an earlier expiry
    Blacklisted,
    Expired,
}

impl RefreshOutcome {
    /// The client has to log in again
    pub fn requires_login(&self) -> bool {
        !matches!(self, RefreshOutcome::Refreshed { .. })
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            RefreshOutcome::Refreshed { access_token } => Some(access_token.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct RefreshAnalyzer {
    tokens: Arc<dyn RefreshTokenStore>,
    codec: Arc<TokenCodec>,
    store_timeout: Duration,
}

impl RefreshAnalyzer {
    pub fn new(
        tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            codec,
            store_timeout,
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AppError> {
        self.refresh_at(refresh_token, Utc::now()).await
    }

    /// Exchange a refresh token for a new access token
    ///
    /// # Errors
    /// - `UnknownToken` if the store has no such token
    /// - `MalformedToken` if the stored token fails signature, algorithm
    ///   or claim checks
    /// - `PersistenceFailure` if the lookup fails, or if an expired token
    ///   cannot be invalidated
    /// - `SigningFailure` if the new access token cannot be signed
    #[tracing::instrument(
        name = "refresh",
        skip(self, refresh_token, now),
        fields(refresh_token = %token_fingerprint(refresh_token))
    )]
    pub async fn refresh_at(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, AppError> {
        let record = with_deadline(self.store_timeout, self.tokens.get_by_token(refresh_token))
            .await?
            .ok_or_else(|| {
                tracing::warn!("Refresh token not found in store");
                AppError::Auth(AuthError::UnknownToken)
            })?;

        if !record.is_valid {
            tracing::warn!(user_id = %record.user_id, "Attempt to use blacklisted refresh token");
            return Ok(RefreshOutcome::Blacklisted);
        }

        let claims = match self.codec.verify_refresh_at(&record.token, now) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                with_deadline(
                    self.store_timeout,
                    self.tokens.update_validity(&record.token, false, now),
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to invalidate expired refresh token");
                    AppError::Persistence(e)
                })?;
                tracing::info!(user_id = %record.user_id, "Refresh token expired, login required");
                return Ok(RefreshOutcome::Expired);
            }
            Err(_) => return Err(TokenError::Malformed.into()),
        };

        if claims.user_id != record.user_id {
            tracing::warn!(
                user_id = %record.user_id,
                claimed = %claims.user_id,
                "Refresh token owner does not match its claims"
            );
            return Err(TokenError::Malformed.into());
        }

        let access_token = self.codec.issue_access(&claims.identity(), now)?;

        tracing::info!(user_id = %claims.user_id, "Access token refreshed");
        Ok(RefreshOutcome::Refreshed { access_token })
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        self.logout_at(refresh_token, Utc::now()).await
    }

    /// Invalidate one refresh token. Logging out twice is not an error.
    ///
    /// # Errors
    /// - `UnknownToken` if the store has no such token
    /// - `PersistenceFailure` if the store call fails or times out
    #[tracing::instrument(
        name = "logout",
        skip(self, refresh_token, now),
        fields(refresh_token = %token_fingerprint(refresh_token))
    )]
    pub async fn logout_at(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let record = with_deadline(self.store_timeout, self.tokens.get_by_token(refresh_token))
            .await?
            .ok_or(AppError::Auth(AuthError::UnknownToken))?;

        with_deadline(
            self.store_timeout,
            self.tokens.update_validity(&record.token, false, now),
        )
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::Auth(AuthError::UnknownToken),
            other => AppError::Persistence(other),
        })?;

        tracing::info!(user_id = %record.user_id, "Refresh token revoked");
        Ok(())
    }
}
