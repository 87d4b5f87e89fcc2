/// JWT Claims structure
///
/// Closed, typed payloads for the two token classes. `AccessClaims` and
/// `RefreshClaims` share one layout but are distinct types, and every token
/// records its class in `token_use` so a token of one class never decodes as
/// the other.

use std::marker::PhantomData;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The class a token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Type-level marker tying a claims type to its token class.
pub trait TokenClass {
    const KIND: TokenKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh;

impl TokenClass for Access {
    const KIND: TokenKind = TokenKind::Access;
}

impl TokenClass for Refresh {
    const KIND: TokenKind = TokenKind::Refresh;
}

/// Who a token speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid, username: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            email,
        }
    }
}

/// JWT claims for one token class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Claims<C> {
    pub user_id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Token class (`access` or `refresh`)
    pub token_use: TokenKind,
    /// Unique token id
    pub jti: Uuid,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    #[serde(skip)]
    class: PhantomData<C>,
}

pub type AccessClaims = Claims<Access>;
pub type RefreshClaims = Claims<Refresh>;

impl<C: TokenClass> Claims<C> {
    /// Create claims for `identity` valid from `now` for `ttl`
    pub fn new(identity: &Identity, now: DateTime<Utc>, ttl: Duration, issuer: &str) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            token_use: C::KIND,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: issuer.to_string(),
            class: PhantomData,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    /// Expired once `now` reaches `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
