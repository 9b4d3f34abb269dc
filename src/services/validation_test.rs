use super::*;

// =============================================================================
// email
// =============================================================================

#[test]
fn email_required() {
    assert_eq!(validate_email("").as_deref(), Some("Email is required"));
    assert_eq!(validate_email("   ").as_deref(), Some("Email is required"));
}

#[test]
fn email_shapes_rejected() {
    for bad in ["alice", "alice@", "@example.com", "alice@example", "alice@example.", "a@b@c.com", "al ice@x.com"] {
        assert_eq!(validate_email(bad).as_deref(), Some("Email is invalid"), "{bad}");
    }
}

#[test]
fn email_shapes_accepted() {
    for good in ["a@b.com", "first.last+tag@mail.example.co", "  padded@example.org  "] {
        assert_eq!(validate_email(good), None, "{good}");
    }
}

// =============================================================================
// password
// =============================================================================

#[test]
fn password_required() {
    assert_eq!(validate_password("", 8).as_deref(), Some("Password is required"));
}

#[test]
fn password_too_short() {
    assert_eq!(validate_password("short", 8).as_deref(), Some("Password must be at least 8 characters"));
    assert_eq!(validate_password("1234567", 8).as_deref(), Some("Password must be at least 8 characters"));
    assert_eq!(validate_password("12345678", 8), None);
}

#[test]
fn password_length_counts_characters() {
    // 7 characters, 14 bytes.
    assert_eq!(validate_password("ééééééé", 8).as_deref(), Some("Password must be at least 8 characters"));
    assert_eq!(validate_password("éééééééé", 8), None);
}

#[test]
fn password_minimum_is_configurable() {
    assert_eq!(validate_password("12345678", 12).as_deref(), Some("Password must be at least 12 characters"));
}

// =============================================================================
// validate_credentials
// =============================================================================

#[test]
fn credentials_short_password_only() {
    let errors = validate_credentials("a@b.com", "short", 8).unwrap_err();
    assert_eq!(errors.email, None);
    assert_eq!(errors.password.as_deref(), Some("Password must be at least 8 characters"));
    assert_eq!(errors.to_string(), "Password must be at least 8 characters");
}

#[test]
fn credentials_both_fields() {
    let errors = validate_credentials("", "", 8).unwrap_err();
    assert_eq!(errors.to_string(), "Email is required; Password is required");
}

#[test]
fn credentials_ok() {
    assert!(validate_credentials("a@b.com", "long enough", 8).is_ok());
}
