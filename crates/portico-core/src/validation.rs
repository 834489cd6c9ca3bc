//! Local input validation for portal forms.
//!
//! These checks run before any remote call so obviously bad input never
//! reaches the backend. Each returns `CoreError::Validation` naming the field.

use crate::errors::CoreError;

/// Minimum password length accepted by sign-up and password reset.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Accepted length range for the application display name.
pub const APP_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Organization shortname: non-empty, `^[a-z0-9-]+$`.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the shortname is empty or contains
/// characters outside lowercase ASCII letters, digits and `-`.
pub fn shortname(value: &str) -> Result<(), CoreError> {
    let value = required("shortname", value)?;
    if value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "shortname '{value}' may only contain lowercase letters, digits and hyphens"
        )))
    }
}

/// A non-empty value with no surrounding-whitespace-only content.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the value is blank.
pub fn non_empty(field: &str, value: &str) -> Result<(), CoreError> {
    required(field, value).map(|_| ())
}

/// Loose email shape check: `local@domain.tld`, no whitespace.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the address is blank or malformed.
pub fn email(value: &str) -> Result<(), CoreError> {
    let value = required("email", value)?;
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && domain.contains('.')
            && !domain.contains('@')
    }) && !value.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("'{value}' is not a valid email address")))
    }
}

/// Password of at least [`MIN_PASSWORD_LEN`] characters.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the password is too short.
pub fn password(value: &str) -> Result<(), CoreError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Password plus a matching confirmation.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the password is too short or the
/// confirmation differs.
pub fn password_confirmation(value: &str, confirmation: &str) -> Result<(), CoreError> {
    password(value)?;
    if value != confirmation {
        return Err(CoreError::Validation("passwords do not match".into()));
    }
    Ok(())
}

/// Application display name within [`APP_NAME_LEN`] characters.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the trimmed name is out of range.
pub fn app_name(value: &str) -> Result<(), CoreError> {
    let len = value.trim().chars().count();
    if APP_NAME_LEN.contains(&len) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "application name must be between {} and {} characters",
            APP_NAME_LEN.start(),
            APP_NAME_LEN.end()
        )))
    }
}
