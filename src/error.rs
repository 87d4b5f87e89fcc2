/// Error Handling Module
///
/// Unified error handling for the credential and session-token core.
/// It covers:
/// 1. Domain-specific error types (validation, store, token, auth, config)
/// 2. The central `AppError` every operation returns
/// 3. Stable outcome codes for the HTTP layer
/// 4. Structured error logging with context

use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Failures reported by the persistence collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound,
    UniqueViolation(String),
    /// An invalidated refresh token may never become valid again.
    RevalidationForbidden,
    Timeout,
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "Record not found"),
            StoreError::UniqueViolation(msg) => write!(f, "Duplicate entry: {}", msg),
            StoreError::RevalidationForbidden => {
                write!(f, "Invalidated refresh token cannot be revalidated")
            }
            StoreError::Timeout => write!(f, "Store call exceeded its deadline"),
            StoreError::Backend(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

/// Token codec errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    UnexpectedAlgorithm,
    Expired,
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::UnexpectedAlgorithm => write!(f, "Unexpected signing algorithm"),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingRequired(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

/// Authentication and authorization errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    UnknownUser,
    InvalidCredentials,
    DuplicateUser,
    UnknownToken,
    MissingToken,
    MalformedHeader,
    InvalidOrExpiredToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UnknownUser => write!(f, "Unknown user"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::DuplicateUser => write!(f, "User already exists"),
            AuthError::UnknownToken => write!(f, "Unknown refresh token"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::MalformedHeader => write!(f, "Malformed authorization header"),
            AuthError::InvalidOrExpiredToken => write!(f, "Invalid or expired token"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that every core operation returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Token(TokenError),
    Persistence(StoreError),
    Hashing(String),
    Config(ConfigError),
}

impl AppError {
    /// Stable outcome code for the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(e) => match e {
                AuthError::UnknownUser => "UNKNOWN_USER",
                AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
                AuthError::DuplicateUser => "DUPLICATE_USER",
                AuthError::UnknownToken => "UNKNOWN_TOKEN",
                AuthError::MissingToken => "MISSING_TOKEN",
                AuthError::MalformedHeader => "MALFORMED_HEADER",
                AuthError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            },
            AppError::Token(e) => match e {
                TokenError::Malformed => "MALFORMED_TOKEN",
                TokenError::UnexpectedAlgorithm => "UNEXPECTED_ALGORITHM",
                TokenError::Expired => "EXPIRED",
                TokenError::Signing(_) => "SIGNING_FAILURE",
            },
            AppError::Persistence(_) => "PERSISTENCE_FAILURE",
            AppError::Hashing(_) => "HASHING_FAILURE",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Infrastructure faults, as opposed to caller or token problems.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Persistence(_)
                | AppError::Hashing(_)
                | AppError::Config(_)
                | AppError::Token(TokenError::Signing(_))
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Persistence(e) => write!(f, "Persistence failure: {}", e),
            AppError::Hashing(msg) => write!(f, "Password hashing failed: {}", msg),
            AppError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS (Control Flow Error Conversion)
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Persistence(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

// ============================================================================
// 3. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Error context for enhanced logging and debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        if error.is_infrastructure() {
            tracing::error!(
                error = %error,
                code = error.kind(),
                context = ?context,
                "Infrastructure failure"
            );
        } else {
            tracing::warn!(
                error = %error,
                code = error.kind(),
                context = ?context,
                "Request rejected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("username".to_string());
        assert_eq!(err.to_string(), "username is empty");
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = StoreError::Timeout.into();
        assert_eq!(app_err, AppError::Persistence(StoreError::Timeout));
        assert_eq!(app_err.kind(), "PERSISTENCE_FAILURE");
        assert!(app_err.is_infrastructure());
    }

    #[test]
    fn test_kinds_are_distinct_for_token_outcomes() {
        let malformed: AppError = TokenError::Malformed.into();
        let algorithm: AppError = TokenError::UnexpectedAlgorithm.into();
        let unknown: AppError = AuthError::UnknownToken.into();

        assert_eq!(malformed.kind(), "MALFORMED_TOKEN");
        assert_eq!(algorithm.kind(), "UNEXPECTED_ALGORITHM");
        assert_eq!(unknown.kind(), "UNKNOWN_TOKEN");
        assert!(!malformed.is_infrastructure());
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert_eq!(err, StoreError::NotFound);
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("login");
        assert_eq!(ctx.operation, "login");
        assert_eq!(ctx.request_id.len(), 36);
    }
}
