/// PostgreSQL stores backed by sqlx
///
/// Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{Credential, NewUser, RefreshTokenRecord, RefreshTokenStore, UserStore};
use crate::error::StoreError;

type CredentialRow = (Uuid, String, Option<String>, String, DateTime<Utc>);
type RefreshTokenRow = (String, Uuid, bool, DateTime<Utc>, DateTime<Utc>);

fn credential_from_row(row: CredentialRow) -> Credential {
    let (user_id, username, email, password_hash, created_at) = row;
    Credential {
        user_id,
        username,
        email,
        password_hash,
        created_at,
    }
}

fn record_from_row(row: RefreshTokenRow) -> RefreshTokenRecord {
    let (token, user_id, is_valid, created_at, updated_at) = row;
    RefreshTokenRecord {
        token,
        user_id,
        is_valid,
        created_at,
        updated_at,
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_login_info(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE username = $1 OR email = $1
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(credential_from_row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(credential_from_row))
    }

    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<Credential, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(credential_from_row(row))
    }
}

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_validity(&self, token: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT is_valid FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(row.try_get::<bool, _>("is_valid")?)
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            INSERT INTO refresh_tokens (token, user_id, is_valid, created_at, updated_at)
            VALUES ($1, $2, TRUE, $3, $3)
            RETURNING token, user_id, is_valid, created_at, updated_at
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(record_from_row(row))
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT token, user_id, is_valid, created_at, updated_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(record_from_row))
    }

    async fn get_all_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT token, user_id, is_valid, created_at, updated_at
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(record_from_row).collect())
    }

    async fn update_validity(
        &self,
        token: &str,
        is_valid: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if is_valid {
            // Only a no-op on an already valid record is allowed
            return if self.current_validity(token).await? {
                Ok(())
            } else {
                Err(StoreError::RevalidationForbidden)
            };
        }

        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_valid = FALSE, updated_at = $1
            WHERE token = $2 AND is_valid = TRUE
            "#,
        )
        .bind(updated_at)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Already invalid is fine; a missing record is not
            self.current_validity(token).await?;
        }

        Ok(())
    }
}
