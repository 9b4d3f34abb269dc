//! Application configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PASSWORD_MIN_LEN: usize = 8;
pub const DEFAULT_LOG_LEVEL: tracing::Level = tracing::Level::WARN;
const SESSION_FILE_NAME: &str = "session.json";
const APP_DIR_NAME: &str = "taskdeck";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: env var {var} not set")]
    Missing { var: &'static str },
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Connection settings for the hosted service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// Project base URL, without trailing slash.
    pub api_url: String,
    /// Public (anon) API key sent with every request.
    pub api_key: String,
    pub timeouts: HttpTimeouts,
    /// Where the signed-in session is kept between runs.
    pub session_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Rest(RestConfig),
    /// In-process backend; nothing survives the process.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    /// Upper bound on sign-up, sign-in and sign-out calls.
    pub auth_timeout: Duration,
    pub password_min_len: usize,
    pub log_level: tracing::Level,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required for the `rest` backend:
    /// - `TASKDECK_API_URL`
    /// - `TASKDECK_API_KEY`
    ///
    /// Optional:
    /// - `TASKDECK_BACKEND`: `rest` (default) or `memory`
    /// - `TASKDECK_AUTH_TIMEOUT_SECS`: default 10
    /// - `TASKDECK_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TASKDECK_CONNECT_TIMEOUT_SECS`: default 10
    /// - `TASKDECK_PASSWORD_MIN_LEN`: default 8
    /// - `TASKDECK_SESSION_FILE`: default `<config dir>/taskdeck/session.json`
    /// - `TASKDECK_LOG_LEVEL`: default `warn`
    ///
    /// # Errors
    ///
    /// Returns an error if a required setting is missing or an enum-valued
    /// setting is unrecognized.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup("TASKDECK_BACKEND").as_deref().unwrap_or("rest") {
            "rest" => BackendConfig::Rest(rest_config(&lookup)?),
            "memory" => BackendConfig::Memory,
            other => return Err(ConfigError::Parse(format!("unknown TASKDECK_BACKEND: {other}"))),
        };

        let auth_timeout =
            Duration::from_secs(parse_or(&lookup, "TASKDECK_AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT_SECS));
        let password_min_len = parse_or(&lookup, "TASKDECK_PASSWORD_MIN_LEN", DEFAULT_PASSWORD_MIN_LEN);
        let log_level = match lookup("TASKDECK_LOG_LEVEL") {
            Some(raw) => raw
                .parse::<tracing::Level>()
                .map_err(|_| ConfigError::Parse(format!("unknown TASKDECK_LOG_LEVEL: {raw}")))?,
            None => DEFAULT_LOG_LEVEL,
        };

        Ok(Self { backend, auth_timeout, password_min_len, log_level })
    }
}

fn rest_config(lookup: &impl Fn(&str) -> Option<String>) -> Result<RestConfig, ConfigError> {
    let api_url = lookup("TASKDECK_API_URL").ok_or(ConfigError::Missing { var: "TASKDECK_API_URL" })?;
    let api_key = lookup("TASKDECK_API_KEY").ok_or(ConfigError::Missing { var: "TASKDECK_API_KEY" })?;
    let timeouts = HttpTimeouts {
        request_secs: parse_or(lookup, "TASKDECK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        connect_secs: parse_or(lookup, "TASKDECK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
    };
    let session_file = lookup("TASKDECK_SESSION_FILE").map_or_else(default_session_file, PathBuf::from);

    Ok(RestConfig { api_url: api_url.trim_end_matches('/').to_owned(), api_key, timeouts, session_file })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(SESSION_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR_NAME}-{SESSION_FILE_NAME}")))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
