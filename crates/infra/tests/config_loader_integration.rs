//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! assembling a runtime from it.

use std::sync::Arc;

use chatlab_common::time::{Clock, MockClock, SystemClock};
use chatlab_domain::{ChatLabError, Environment};
use chatlab_infra::config;
use chatlab_infra::runtime::{build_context, build_ports, SyncBackends};
use tempfile::TempDir;

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("chatlab.toml");
    std::fs::write(
        &path,
        r#"
environment = "production"

[endpoints]
identity_base_url = "https://identity.example.com/api/v1"
oauth_proxy_base_url = "https://lab.example.com/fidu-chat-lab/api"

[oauth]
client_id = "client.apps.googleusercontent.com"
redirect_uri = "https://lab.example.com/oauth-callback"

[auto_sync]
delay_minutes = 10

[storage]
state_path = "/var/lib/chatlab/state.json"

[logging]
level = "chatlab_core=debug,info"
json = true
"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("config should load");

    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.endpoints.identity_base_url, "https://identity.example.com/api/v1");
    assert_eq!(config.oauth.redirect_uri, "https://lab.example.com/oauth-callback");
    assert!(!config.direct_fallback_enabled());
    assert_eq!(config.auto_sync.delay_minutes, 10);
    assert_eq!(config.auto_sync.retry_delay_minutes, 10);
    assert!(config.storage.state_path.is_some());
    assert!(config.logging.json);
}

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("chatlab.json");
    std::fs::write(
        &path,
        r#"{
            "environment": "development",
            "oauth": { "client_id": "dev-client", "client_secret": "dev-secret" },
            "identity": { "safety_margin_secs": 120 }
        }"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("config should load");

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.oauth.client_secret.as_deref(), Some("dev-secret"));
    assert!(config.direct_fallback_enabled());
    assert_eq!(config.identity.safety_margin_secs, 120);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("chatlab.toml");
    std::fs::write(&path, "environment = [").expect("Failed to write config");

    let result = config::load_from_file(Some(path));
    assert!(matches!(result, Err(ChatLabError::Config(_))));
}

/// Validates `build_context` behavior for the file-configured scenario.
///
/// Assertions:
/// - Confirms the context carries the loaded configuration.
/// - Confirms a configured state path is used for persisted settings.
#[tokio::test]
async fn test_context_from_loaded_config() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let state_path = dir.path().join("state").join("chatlab.json");
    let config_path = dir.path().join("chatlab.toml");
    std::fs::write(
        &config_path,
        format!(
            "environment = \"staging\"\n\n[storage]\nstate_path = {:?}\n",
            state_path.display().to_string()
        ),
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(config_path)).expect("config should load");
    let clock: Arc<dyn Clock> = Arc::new(MockClock::at_epoch_ms(0));
    let context =
        build_context(config, SyncBackends::in_memory(clock)).expect("context should build");

    assert_eq!(context.config.environment, Environment::Staging);
    context.update_sync_delay(12).await.expect("settings should save");
    assert!(state_path.exists());
    assert_eq!(context.auto_sync.config().delay_minutes, 12);
}

#[test]
fn test_ports_reject_invalid_proxy_url() {
    let mut config = chatlab_domain::AppConfig::default();
    config.endpoints.oauth_proxy_base_url = "::not-a-url".to_string();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let result = build_ports(&config, SyncBackends::in_memory(clock.clone()), clock);
    assert!(matches!(result, Err(ChatLabError::Config(_))));
}
