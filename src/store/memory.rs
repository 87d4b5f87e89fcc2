/// In-memory stores for tests and embedded use

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Credential, NewUser, RefreshTokenRecord, RefreshTokenStore, UserStore};
use crate::error::StoreError;

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, Credential>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_login_info(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.username == identifier || u.email.as_deref() == Some(identifier))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<Credential, StoreError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation("username".to_string()));
        }
        if let Some(email) = user.email.as_deref() {
            if users.values().any(|u| u.email.as_deref() == Some(email)) {
                return Err(StoreError::UniqueViolation("email".to_string()));
            }
        }

        let credential = Credential {
            user_id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
        };
        users.insert(credential.user_id, credential.clone());
        Ok(credential)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: Arc<RwLock<HashMap<String, RefreshTokenRecord>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut tokens = self.tokens.write().await;

        if tokens.contains_key(token) {
            return Err(StoreError::UniqueViolation("refresh token".to_string()));
        }

        let record = RefreshTokenRecord {
            token: token.to_string(),
            user_id,
            is_valid: true,
            created_at: now,
            updated_at: now,
        };
        tokens.insert(record.token.clone(), record.clone());
        Ok(record)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token).cloned())
    }

    async fn get_all_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let tokens = self.tokens.read().await;
        let mut records: Vec<RefreshTokenRecord> = tokens
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn update_validity(
        &self,
        token: &str,
        is_valid: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().await;
        let record = tokens.get_mut(token).ok_or(StoreError::NotFound)?;

        match (record.is_valid, is_valid) {
            (false, true) => Err(StoreError::RevalidationForbidden),
            (true, false) => {
                record.is_valid = false;
                record.updated_at = updated_at;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
