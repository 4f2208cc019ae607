//! Field rules shared by the auth, user and note endpoints.
//!
//! Lengths are counted in characters, not bytes.

use thiserror::Error;

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 16;
pub const TITLE_MIN: usize = 1;
pub const TITLE_MAX: usize = 100;

/// A request field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {min} and {max} characters"),
        ));
    }
    Ok(())
}

/// Trim and length-check a first or last name.
///
/// # Errors
///
/// Returns `ValidationError` if the trimmed name is out of range.
pub fn name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    check_length(field, trimmed, NAME_MIN, NAME_MAX)?;
    Ok(trimmed.to_owned())
}

/// Length-check a password. Passwords are not trimmed.
///
/// # Errors
///
/// Returns `ValidationError` if the password is out of range.
pub fn password(value: &str) -> Result<(), ValidationError> {
    check_length("password", value, PASSWORD_MIN, PASSWORD_MAX)
}

/// Trim and length-check a note title.
///
/// # Errors
///
/// Returns `ValidationError` if the trimmed title is out of range.
pub fn title(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    check_length("title", trimmed, TITLE_MIN, TITLE_MAX)?;
    Ok(trimmed.to_owned())
}

/// Normalize an optional free-text field: blank becomes `None`.
#[must_use]
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
