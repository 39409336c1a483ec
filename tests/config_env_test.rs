//! Environment-driven configuration tests.
//!
//! These mutate process environment variables, so they run serially.

use std::time::Duration;

use ragbridge::config::{
    BridgeConfig, ENV_AGENT_URL, ENV_IDLE_TIMEOUT_SECS, ENV_POLL_INTERVAL_MS, ENV_TESTER_URL,
};
use serial_test::serial;

fn clear_env() {
    for key in [
        ENV_AGENT_URL,
        ENV_TESTER_URL,
        ENV_POLL_INTERVAL_MS,
        ENV_IDLE_TIMEOUT_SECS,
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    assert_eq!(BridgeConfig::from_env(), BridgeConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var(ENV_AGENT_URL, "http://rag.example:8000/");
    std::env::set_var(ENV_TESTER_URL, "http://tester.example:8001");
    std::env::set_var(ENV_POLL_INTERVAL_MS, "750");
    std::env::set_var(ENV_IDLE_TIMEOUT_SECS, "0");

    let config = BridgeConfig::from_env();
    clear_env();

    assert_eq!(config.agent_url, "http://rag.example:8000");
    assert_eq!(config.tester_url, "http://tester.example:8001");
    assert_eq!(config.poll_interval, Duration::from_millis(750));
    assert!(config.idle_timeout.is_none());
}

#[test]
#[serial]
fn test_from_env_zero_interval_is_clamped() {
    clear_env();
    std::env::set_var(ENV_POLL_INTERVAL_MS, "0");

    let config = BridgeConfig::from_env();
    clear_env();

    assert_eq!(config.poll_interval, Duration::from_millis(1));
}

#[test]
#[serial]
fn test_from_env_invalid_values_use_defaults() {
    clear_env();
    std::env::set_var(ENV_POLL_INTERVAL_MS, "fast");
    std::env::set_var(ENV_IDLE_TIMEOUT_SECS, "forever");

    let config = BridgeConfig::from_env();
    clear_env();

    assert_eq!(config.poll_interval, BridgeConfig::default().poll_interval);
    assert_eq!(config.idle_timeout, BridgeConfig::default().idle_timeout);
}
