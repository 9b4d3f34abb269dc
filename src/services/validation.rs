//! Credential form validation, run before any auth call.

use std::fmt;

pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Email is invalid";
pub const PASSWORD_REQUIRED: &str = "Password is required";

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl FormErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = [self.email.as_deref(), self.password.as_deref()];
        let joined = messages.into_iter().flatten().collect::<Vec<_>>().join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for FormErrors {}

/// `local@domain.tld` shape: one `@`, no whitespace, non-empty local part,
/// and a domain of at least two non-empty dot-separated labels.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let parts = email.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() {
        return false;
    }
    let labels = parts[1].split('.').collect::<Vec<_>>();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

#[must_use]
pub fn validate_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        return Some(EMAIL_REQUIRED.to_owned());
    }
    if !is_valid_email(email) {
        return Some(EMAIL_INVALID.to_owned());
    }
    None
}

/// Length is counted in characters, not bytes.
#[must_use]
pub fn validate_password(password: &str, min_len: usize) -> Option<String> {
    if password.is_empty() {
        return Some(PASSWORD_REQUIRED.to_owned());
    }
    if password.chars().count() < min_len {
        return Some(format!("Password must be at least {min_len} characters"));
    }
    None
}

/// # Errors
///
/// Returns every field that failed validation.
pub fn validate_credentials(email: &str, password: &str, min_password_len: usize) -> Result<(), FormErrors> {
    let errors = FormErrors { email: validate_email(email), password: validate_password(password, min_password_len) };
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
