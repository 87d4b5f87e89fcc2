/// Authentication Service
///
/// The function-call surface the HTTP layer talks to: register, login,
/// refresh, logout and per-request authentication. Built once at startup
/// from validated settings; every component shares the same immutable
/// codec.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::auth::claims::AccessClaims;
use crate::auth::guard::AccessGuard;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{validate_password_strength, PasswordHasher};
use crate::auth::refresh_token::{RefreshAnalyzer, RefreshOutcome};
use crate::auth::session::{SessionIssuer, TokenPair};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, ConfigError, ErrorContext, StoreError};
use crate::store::{
    with_deadline, Credential, NewUser, PublicUser, RefreshTokenStore, UserStore,
};
use crate::validators::{is_valid_username, normalize_email};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    store_timeout: Duration,
    sessions: SessionIssuer,
    refresher: RefreshAnalyzer,
    guard: AccessGuard,
}

impl AuthService {
    /// # Errors
    /// Returns error if `settings` fail validation
    pub fn new(
        settings: &AuthSettings,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self, ConfigError> {
        let codec = Arc::new(TokenCodec::from_settings(settings)?);
        let hasher = PasswordHasher::new(settings.password_cost);
        let store_timeout = settings.store_timeout();

        Ok(Self {
            sessions: SessionIssuer::new(
                users.clone(),
                tokens.clone(),
                codec.clone(),
                hasher,
                store_timeout,
            ),
            refresher: RefreshAnalyzer::new(tokens, codec.clone(), store_timeout),
            guard: AccessGuard::new(codec),
            users,
            hasher,
            store_timeout,
        })
    }

    /// The guard shared with request middleware
    pub fn guard(&self) -> AccessGuard {
        self.guard.clone()
    }

    /// Register a new user
    ///
    /// # Errors
    /// - `ValidationError` for a bad username, blank email or weak password
    /// - `DuplicateUser` if the username or email is taken
    /// - `HashingFailure` / `PersistenceFailure` on infrastructure faults
    #[tracing::instrument(name = "register", skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<PublicUser, AppError> {
        let context = ErrorContext::new("user_registration");

        let credential = self
            .create_account(username, email, password)
            .await
            .map_err(|e| log_failure(&context, e))?;

        tracing::info!(
            request_id = %context.request_id,
            user_id = %credential.user_id,
            "User registered successfully"
        );
        Ok(credential.to_public())
    }

    async fn create_account(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<Credential, AppError> {
        let username = is_valid_username(username)?;
        let email = normalize_email(email)?;
        validate_password_strength(password)?;
        let password_hash = self.hasher.hash_async(password.to_string()).await?;

        let user = NewUser {
            username,
            email,
            password_hash,
        };
        with_deadline(self.store_timeout, self.users.create_user(user, Utc::now()))
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => AppError::Auth(AuthError::DuplicateUser),
                other => AppError::Persistence(other),
            })
    }

    /// Look up a user by username, without credential material
    pub async fn find_user(&self, username: &str) -> Result<PublicUser, AppError> {
        with_deadline(self.store_timeout, self.users.find_by_username(username))
            .await?
            .map(|credential| credential.to_public())
            .ok_or(AppError::Auth(AuthError::UnknownUser))
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, AppError> {
        let context = ErrorContext::new("user_login");
        self.sessions
            .login(identifier, password)
            .await
            .map_err(|e| log_failure(&context, e))
    }

    /// `Blacklisted` and `Expired` are outcomes, not errors
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AppError> {
        let context = ErrorContext::new("token_refresh");
        self.refresher
            .refresh(refresh_token)
            .await
            .map_err(|e| log_failure(&context, e))
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let context = ErrorContext::new("user_logout");
        self.refresher
            .logout(refresh_token)
            .await
            .map_err(|e| log_failure(&context, e))
    }

    pub fn authenticate_request(&self, header: Option<&str>) -> Result<AccessClaims, AuthError> {
        self.guard.authenticate_request(header)
    }
}

fn log_failure(context: &ErrorContext, error: AppError) -> AppError {
    context.log_error(&error);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::store::{InMemoryRefreshTokenStore, InMemoryUserStore};

    fn service() -> AuthService {
        let mut settings = AuthSettings::new(
            "access-secret-key-at-least-32-characters",
            "refresh-secret-key-at-least-32-characters",
        );
        settings.password_cost = 4;
        AuthService::new(
            &settings,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryRefreshTokenStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let secret = "same-secret-used-for-both-token-classes";
        let settings = AuthSettings::new(secret, secret);

        let result = AuthService::new(
            &settings,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryRefreshTokenStore::new()),
        );

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_register_returns_public_user() {
        let service = service();

        let user = service
            .register("ursula", Some("ursula@example.com"), "SecurePass123")
            .await
            .unwrap();

        assert_eq!(user.username, "ursula");
        assert_eq!(user.email.as_deref(), Some("ursula@example.com"));
        assert_eq!(service.find_user("ursula").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_register_duplicate_user() {
        let service = service();
        service.register("ursula", None, "SecurePass123").await.unwrap();

        let result = service.register("ursula", None, "SecurePass123").await;

        assert_eq!(result, Err(AppError::Auth(AuthError::DuplicateUser)));
    }

    #[tokio::test]
    async fn test_register_weak_password() {
        let service = service();

        let result = service.register("ursula", None, "short").await;

        assert!(matches!(result, Err(AppError::Validation(ValidationError::TooShort(_, _)))));
    }

    #[tokio::test]
    async fn test_register_bad_username() {
        let service = service();

        let result = service.register("no spaces allowed", None, "SecurePass123").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_failed_operations_return_typed_errors() {
        let service = service();

        assert_eq!(
            service.login("nobody", "SecurePass123").await,
            Err(AppError::Auth(AuthError::UnknownUser))
        );
        assert_eq!(
            service.refresh("unknown").await,
            Err(AppError::Auth(AuthError::UnknownToken))
        );
        assert_eq!(
            service.logout("unknown").await,
            Err(AppError::Auth(AuthError::UnknownToken))
        );
    }

    #[test]
    fn test_log_failure_passes_error_through() {
        let context = ErrorContext::new("user_logout");
        let error = AppError::Persistence(StoreError::Timeout);

        assert_eq!(log_failure(&context, error.clone()), error);
    }

    #[tokio::test]
    async fn test_find_unknown_user() {
        let service = service();

        assert_eq!(
            service.find_user("nobody").await,
            Err(AppError::Auth(AuthError::UnknownUser))
        );
    }
}
