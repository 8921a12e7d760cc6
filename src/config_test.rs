use super::*;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// # Safety
/// Callers must hold [`env_lock`] so no other test mutates the environment.
unsafe fn clear_session_env() {
    unsafe {
        std::env::remove_var("SESSION_BASE_URL");
        std::env::remove_var("SESSION_API_PREFIX");
        std::env::remove_var("SESSION_LOGIN_PATH");
        std::env::remove_var("SESSION_TOKEN_FILE");
        std::env::remove_var("SESSION_REQUEST_TIMEOUT_MS");
        std::env::remove_var("SESSION_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("SESSION_RETRIES");
        std::env::remove_var("SESSION_RETRY_DELAY_MS");
        std::env::remove_var("SESSION_WATCH_INTERVAL_MS");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = env_lock();
    unsafe { clear_session_env() };

    let cfg = SessionConfig::from_env().unwrap();
    assert_eq!(cfg, SessionConfig::default());
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.api_prefix, "api/v1/user");
    assert_eq!(cfg.timeouts.request, Duration::from_secs(30));
    assert_eq!(cfg.retry.retries, 0);
}

#[test]
fn from_env_parses_overrides() {
    let _guard = env_lock();
    unsafe {
        clear_session_env();
        std::env::set_var("SESSION_BASE_URL", "https://blog.example.test/");
        std::env::set_var("SESSION_API_PREFIX", "/api/v2/user/");
        std::env::set_var("SESSION_LOGIN_PATH", "/signin");
        std::env::set_var("SESSION_TOKEN_FILE", "/tmp/tokens.json");
        std::env::set_var("SESSION_REQUEST_TIMEOUT_MS", "2500");
        std::env::set_var("SESSION_CONNECT_TIMEOUT_SECS", "3");
        std::env::set_var("SESSION_RETRIES", "2");
        std::env::set_var("SESSION_RETRY_DELAY_MS", "50");
        std::env::set_var("SESSION_WATCH_INTERVAL_MS", "100");
    }

    let cfg = SessionConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://blog.example.test");
    assert_eq!(cfg.api_prefix, "api/v2/user");
    assert_eq!(cfg.login_path, "/signin");
    assert_eq!(cfg.token_file, PathBuf::from("/tmp/tokens.json"));
    assert_eq!(
        cfg.timeouts,
        Timeouts { request: Duration::from_millis(2500), connect: Duration::from_secs(3) }
    );
    assert_eq!(cfg.retry, RetryPolicy { retries: 2, delay: Duration::from_millis(50) });
    assert_eq!(cfg.watch_interval, Duration::from_millis(100));

    unsafe { clear_session_env() };
}

#[test]
fn from_env_malformed_number_errors() {
    let _guard = env_lock();
    unsafe {
        clear_session_env();
        std::env::set_var("SESSION_RETRIES", "many");
    }

    let err = SessionConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("SESSION_RETRIES"));

    unsafe { clear_session_env() };
}
