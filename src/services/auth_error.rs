//! User-facing messages for auth failures.

/// Substring the service uses for a wrong email/password pair.
pub const INVALID_CREDENTIALS_PHRASE: &str = "Invalid login credentials";
/// Substring the service uses when the account exists but is unconfirmed.
pub const EMAIL_NOT_CONFIRMED_PHRASE: &str = "Email not confirmed";
pub const EMAIL_NOT_CONFIRMED_CODE: &str = "email_not_confirmed";

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
pub const EMAIL_NOT_CONFIRMED_MESSAGE: &str =
    "Please confirm your email address before signing in. Check your inbox for the confirmation link.";
/// Published when an auth call does not settle within the configured bound.
pub const TIMEOUT_MESSAGE: &str = "Request is taking too long. Please check your connection and try again.";
/// Published after sign-up when the service withholds a session pending confirmation.
pub const SIGN_UP_CONFIRMATION_MESSAGE: &str =
    "Account created. Please check your email to confirm your account before signing in.";

/// Map a raw service error to the message shown to the user.
///
/// Matching is a case-sensitive substring test; unknown errors pass through
/// verbatim.
#[must_use]
pub fn classify_auth_error(raw_message: &str, raw_code: Option<&str>) -> String {
    if raw_message.contains(INVALID_CREDENTIALS_PHRASE) {
        return INVALID_CREDENTIALS_MESSAGE.to_owned();
    }
    if raw_message.contains(EMAIL_NOT_CONFIRMED_PHRASE) || raw_code == Some(EMAIL_NOT_CONFIRMED_CODE) {
        return EMAIL_NOT_CONFIRMED_MESSAGE.to_owned();
    }
    raw_message.to_owned()
}

#[cfg(test)]
#[path = "auth_error_test.rs"]
mod tests;
