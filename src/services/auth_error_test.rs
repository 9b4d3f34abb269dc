use super::*;

#[test]
fn invalid_credentials_maps_to_generic_message() {
    assert_eq!(classify_auth_error("Invalid login credentials", None), "Invalid email or password");
    assert_eq!(
        classify_auth_error("AuthApiError: Invalid login credentials", Some("invalid_credentials")),
        "Invalid email or password"
    );
}

#[test]
fn unconfirmed_email_by_message() {
    assert_eq!(classify_auth_error("Email not confirmed", None), EMAIL_NOT_CONFIRMED_MESSAGE);
}

#[test]
fn unconfirmed_email_by_code() {
    assert_eq!(classify_auth_error("something else", Some("email_not_confirmed")), EMAIL_NOT_CONFIRMED_MESSAGE);
}

#[test]
fn matching_is_case_sensitive() {
    assert_eq!(classify_auth_error("invalid login credentials", None), "invalid login credentials");
    assert_eq!(classify_auth_error("EMAIL NOT CONFIRMED", None), "EMAIL NOT CONFIRMED");
}

#[test]
fn unknown_errors_pass_through() {
    assert_eq!(classify_auth_error("User already registered", Some("user_already_exists")), "User already registered");
    assert_eq!(classify_auth_error("", None), "");
}

#[test]
fn fixed_messages() {
    assert_eq!(TIMEOUT_MESSAGE, "Request is taking too long. Please check your connection and try again.");
    assert!(SIGN_UP_CONFIRMATION_MESSAGE.starts_with("Account created."));
}
