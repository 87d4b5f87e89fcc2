/// Input validators for registration
///
/// Email format is checked upstream; here an email only has to be present
/// and of sane length when supplied.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap();
}

/// Validates a username
/// - Trims surrounding whitespace
/// - 3 to 32 characters
/// - Letters, digits, `_`, `.` and `-` only
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if trimmed.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort(
            "username".to_string(),
            MIN_USERNAME_LENGTH,
        ));
    }

    if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong(
            "username".to_string(),
            MAX_USERNAME_LENGTH,
        ));
    }

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Normalizes an optional, already format-checked email
pub fn normalize_email(email: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(email) = email else {
        return Ok(None);
    };
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    Ok(Some(trimmed.to_string()))
}
