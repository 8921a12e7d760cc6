//! Session configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_API_PREFIX: &str = "api/v1/user";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_TOKEN_FILE: &str = ".session/tokens.json";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRIES: u32 = 0;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {key}={value}")]
    Parse { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub connect: Duration,
}

/// Transient-failure retry policy for the request wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub login_path: String,
    pub token_file: PathBuf,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
    pub watch_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            timeouts: Timeouts {
                request: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
                connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            retry: RetryPolicy { retries: DEFAULT_RETRIES, delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS) },
            watch_interval: Duration::from_millis(DEFAULT_WATCH_INTERVAL_MS),
        }
    }
}

impl SessionConfig {
    /// Build typed session config from environment variables.
    ///
    /// All optional:
    /// - `SESSION_BASE_URL`: backend origin, trailing `/` trimmed
    /// - `SESSION_API_PREFIX`: path prefix of the auth endpoints
    /// - `SESSION_LOGIN_PATH`: redirect target for restricted routes
    /// - `SESSION_TOKEN_FILE`: persisted token location
    /// - `SESSION_REQUEST_TIMEOUT_MS`: default 30000
    /// - `SESSION_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SESSION_RETRIES`: transient retries, default 0
    /// - `SESSION_RETRY_DELAY_MS`: default 1000
    /// - `SESSION_WATCH_INTERVAL_MS`: storage poll interval, default 500
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a numeric variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("SESSION_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let api_prefix = std::env::var("SESSION_API_PREFIX")
            .unwrap_or_else(|_| DEFAULT_API_PREFIX.to_owned())
            .trim_matches('/')
            .to_owned();
        let login_path = std::env::var("SESSION_LOGIN_PATH").unwrap_or_else(|_| DEFAULT_LOGIN_PATH.to_owned());
        let token_file =
            PathBuf::from(std::env::var("SESSION_TOKEN_FILE").unwrap_or_else(|_| DEFAULT_TOKEN_FILE.to_owned()));

        let timeouts = Timeouts {
            request: Duration::from_millis(env_parse("SESSION_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?),
            connect: Duration::from_secs(env_parse("SESSION_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?),
        };
        let retry = RetryPolicy {
            retries: env_parse("SESSION_RETRIES", DEFAULT_RETRIES)?,
            delay: Duration::from_millis(env_parse("SESSION_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)?),
        };
        let watch_interval = Duration::from_millis(env_parse("SESSION_WATCH_INTERVAL_MS", DEFAULT_WATCH_INTERVAL_MS)?);

        Ok(Self { base_url, api_prefix, login_path, token_file, timeouts, retry, watch_interval })
    }
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Parse { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
