use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect::<HashMap<_, _>>();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn rest_defaults() {
    let cfg = AppConfig::from_lookup(lookup_from(&[
        ("TASKDECK_API_URL", "https://project.example.co/"),
        ("TASKDECK_API_KEY", "anon"),
    ]))
    .unwrap();

    let BackendConfig::Rest(rest) = &cfg.backend else {
        panic!("expected rest backend");
    };
    assert_eq!(rest.api_url, "https://project.example.co");
    assert_eq!(rest.api_key, "anon");
    assert_eq!(
        rest.timeouts,
        HttpTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
    assert!(rest.session_file.ends_with(SESSION_FILE_NAME));
    assert_eq!(cfg.auth_timeout, Duration::from_secs(10));
    assert_eq!(cfg.password_min_len, 8);
    assert_eq!(cfg.log_level, tracing::Level::WARN);
}

#[test]
fn rest_overrides() {
    let cfg = AppConfig::from_lookup(lookup_from(&[
        ("TASKDECK_BACKEND", "rest"),
        ("TASKDECK_API_URL", "http://localhost:54321"),
        ("TASKDECK_API_KEY", "anon"),
        ("TASKDECK_AUTH_TIMEOUT_SECS", "3"),
        ("TASKDECK_REQUEST_TIMEOUT_SECS", "42"),
        ("TASKDECK_CONNECT_TIMEOUT_SECS", "7"),
        ("TASKDECK_PASSWORD_MIN_LEN", "12"),
        ("TASKDECK_SESSION_FILE", "/tmp/taskdeck/s.json"),
        ("TASKDECK_LOG_LEVEL", "debug"),
    ]))
    .unwrap();

    let BackendConfig::Rest(rest) = &cfg.backend else {
        panic!("expected rest backend");
    };
    assert_eq!(rest.timeouts, HttpTimeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(rest.session_file, PathBuf::from("/tmp/taskdeck/s.json"));
    assert_eq!(cfg.auth_timeout, Duration::from_secs(3));
    assert_eq!(cfg.password_min_len, 12);
    assert_eq!(cfg.log_level, tracing::Level::DEBUG);
}

#[test]
fn rest_requires_url_and_key() {
    let err = AppConfig::from_lookup(lookup_from(&[("TASKDECK_API_KEY", "anon")])).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "TASKDECK_API_URL" });

    let err = AppConfig::from_lookup(lookup_from(&[("TASKDECK_API_URL", "http://x")])).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "TASKDECK_API_KEY" });
}

#[test]
fn memory_backend_needs_nothing() {
    let cfg = AppConfig::from_lookup(lookup_from(&[("TASKDECK_BACKEND", "memory")])).unwrap();
    assert_eq!(cfg.backend, BackendConfig::Memory);
}

#[test]
fn unparsable_numbers_fall_back_to_defaults() {
    let cfg = AppConfig::from_lookup(lookup_from(&[
        ("TASKDECK_BACKEND", "memory"),
        ("TASKDECK_AUTH_TIMEOUT_SECS", "soon"),
        ("TASKDECK_PASSWORD_MIN_LEN", "-1"),
    ]))
    .unwrap();
    assert_eq!(cfg.auth_timeout, Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS));
    assert_eq!(cfg.password_min_len, DEFAULT_PASSWORD_MIN_LEN);
}

#[test]
fn unknown_enum_values_error() {
    let err = AppConfig::from_lookup(lookup_from(&[("TASKDECK_BACKEND", "sqlite")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("unknown TASKDECK_BACKEND"));

    let err = AppConfig::from_lookup(lookup_from(&[("TASKDECK_BACKEND", "memory"), ("TASKDECK_LOG_LEVEL", "loud")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("unknown TASKDECK_LOG_LEVEL"));
}
