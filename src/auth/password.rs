/// Password Hashing and Verification
///
/// Salted, adaptive one-way hashing with bcrypt plus the password policy
/// applied at registration.

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
// bcrypt only reads the first 72 bytes of its input
const MAX_PASSWORD_LENGTH: usize = 72;

/// Bcrypt hasher with a cost factor fixed at startup
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt
    ///
    /// The output embeds algorithm, cost, salt and digest (`$2b$<cost>$...`).
    ///
    /// # Errors
    /// Returns `AppError::Hashing` if bcrypt rejects the cost or input
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, self.cost).map_err(|e| AppError::Hashing(e.to_string()))
    }

    /// Verify a password against a stored hash
    ///
    /// A wrong password and a corrupt hash both yield `false`.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Hash on the blocking pool so request tasks keep running.
    pub async fn hash_async(&self, password: String) -> Result<String, AppError> {
        let hasher = *self;
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || span.in_scope(|| hasher.hash(&password)))
            .await
            .map_err(|e| AppError::Hashing(e.to_string()))?
    }

    /// Verify on the blocking pool; a panicked or cancelled job counts as a mismatch.
    pub async fn verify_async(&self, password: String, hash: String) -> bool {
        let hasher = *self;
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || span.in_scope(|| hasher.verify(&password, &hash)))
            .await
            .unwrap_or(false)
    }
}

/// Validate password strength requirements
///
/// Requirements:
/// - Minimum 8 characters
/// - Maximum 72 bytes
/// - At least one digit
/// - At least one lowercase letter
/// - At least one uppercase letter
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        ));
    }

    Ok(())
}
