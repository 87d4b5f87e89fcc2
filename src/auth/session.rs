/// Session issuance
///
/// Login verifies the password, invalidates every refresh token the user
/// still holds, then issues and persists a fresh access/refresh pair.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::claims::Identity;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::PasswordHasher;
use crate::error::{AppError, AuthError};
use crate::store::{with_deadline, RefreshTokenStore, UserStore};
use crate::telemetry::token_fingerprint;

/// Tokens handed back on a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct SessionIssuer {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    store_timeout: Duration,
}

impl SessionIssuer {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
        hasher: PasswordHasher,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            codec,
            hasher,
            store_timeout,
        }
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, AppError> {
        self.login_at(identifier, password, Utc::now()).await
    }

    /// Authenticate by username or email and open a new session
    ///
    /// # Errors
    /// - `UnknownUser` if no user matches `identifier`
    /// - `InvalidCredentials` on a password mismatch
    /// - `PersistenceFailure` if a lookup, an invalidation or the insert
    ///   fails or times out; nothing is issued in that case
    /// - `SigningFailure` if either token cannot be signed
    #[tracing::instrument(name = "login", skip(self, password, now), fields(user_id = tracing::field::Empty))]
    pub async fn login_at(
        &self,
        identifier: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AppError> {
        let credential = with_deadline(self.store_timeout, self.users.find_login_info(identifier))
            .await?
            .ok_or_else(|| {
                tracing::warn!("Login attempt for unknown user");
                AppError::Auth(AuthError::UnknownUser)
            })?;
        tracing::Span::current().record("user_id", tracing::field::display(credential.user_id));

        let password_valid = self
            .hasher
            .verify_async(password.to_string(), credential.password_hash.clone())
            .await;
        if !password_valid {
            tracing::warn!("Login attempt with invalid password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let rotated = self.invalidate_outstanding(credential.user_id, now).await?;

        let identity = Identity::new(
            credential.user_id,
            credential.username.clone(),
            credential.email.clone(),
        );
        let access_token = self.codec.issue_access(&identity, now)?;
        let refresh_token = self.codec.issue_refresh(&identity, now)?;

        with_deadline(
            self.store_timeout,
            self.tokens.create(&refresh_token, credential.user_id, now),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to persist refresh token");
            AppError::Persistence(e)
        })?;

        tracing::info!(
            rotated,
            refresh_token = %token_fingerprint(&refresh_token),
            "User logged in successfully"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.codec.access_ttl().num_seconds(),
        })
    }

    /// Flag every still-valid refresh token of `user_id` invalid.
    /// Stops at the first failure so no new token is issued next to a
    /// partially rotated set.
    async fn invalidate_outstanding(
        &self,
        user_id: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let records = with_deadline(self.store_timeout, self.tokens.get_all_for_user(user_id)).await?;

        let mut rotated = 0;
        for record in records.iter().filter(|r| r.is_valid) {
            with_deadline(
                self.store_timeout,
                self.tokens.update_validity(&record.token, false, now),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    refresh_token = %token_fingerprint(&record.token),
                    "Failed to invalidate previous refresh token"
                );
                AppError::Persistence(e)
            })?;
            rotated += 1;
        }

        Ok(rotated)
    }
}
