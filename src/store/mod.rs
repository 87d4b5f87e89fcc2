/// Persistence collaborators used by the token core.
///
/// The core only depends on the two traits below; `memory` and `postgres`
/// provide implementations.

mod memory;
mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

pub use memory::{InMemoryRefreshTokenStore, InMemoryUserStore};
pub use postgres::{PgRefreshTokenStore, PgUserStore};

/// Stored login information for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub user_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// A user as shown to callers, without the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user about to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

/// One issued refresh token. Never deleted; only `is_valid` changes, and
/// only from `true` to `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub user_id: Uuid,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User lookup collaborator
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find login information by username or email
    async fn find_login_info(&self, identifier: &str) -> Result<Option<Credential>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StoreError>;

    /// Insert a new user
    ///
    /// # Errors
    /// `StoreError::UniqueViolation` if the username or email is taken
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<Credential, StoreError>;
}

/// Refresh-token persistence collaborator
///
/// The store is an append-only log keyed by token string with a mutable
/// validity flag. It does not enforce one valid token per user.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persist a newly issued token with `is_valid = true`
    async fn create(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError>;

    async fn get_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Every record ever issued to `user_id`, oldest first
    async fn get_all_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    /// Set the validity flag
    ///
    /// Setting a value the record already holds is a no-op, so repeated
    /// invalidation leaves the record untouched.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if no record has this token
    /// - `StoreError::RevalidationForbidden` for a false -> true transition
    async fn update_validity(
        &self,
        token: &str,
        is_valid: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Run a store call under a deadline; an elapsed deadline is `StoreError::Timeout`.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(deadline_ms = deadline.as_millis() as u64, "Store call timed out");
            Err(StoreError::Timeout)
        }
    }
}
