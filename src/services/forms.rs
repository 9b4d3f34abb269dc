//! Credential form submission: validate locally, then hand off to the session.

use crate::services::session::SessionController;
use crate::services::validation::{FormErrors, validate_credentials};

/// Validate and submit the sign-up form.
///
/// # Errors
///
/// Returns the field errors; the auth service is not contacted.
pub async fn submit_sign_up(
    session: &SessionController,
    email: &str,
    password: &str,
    min_password_len: usize,
) -> Result<(), FormErrors> {
    validate_credentials(email, password, min_password_len)?;
    session.sign_up(email.trim(), password).await;
    Ok(())
}

/// Validate and submit the sign-in form.
///
/// # Errors
///
/// Returns the field errors; the auth service is not contacted.
pub async fn submit_login(
    session: &SessionController,
    email: &str,
    password: &str,
    remember_me: bool,
    min_password_len: usize,
) -> Result<(), FormErrors> {
    validate_credentials(email, password, min_password_len)?;
    session.login(email.trim(), password, remember_me).await;
    Ok(())
}

#[cfg(test)]
#[path = "forms_test.rs"]
mod tests;
