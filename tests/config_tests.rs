// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, env var overrides, and participant directory validation

use portal_chat::config::Config;
use portal_chat_core::Role;
use serial_test::serial;
use std::io::Write;
use tempfile::TempDir;

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    for var in [
        "PORTAL_CHAT_CONFIG_PATH",
        "PORTAL_CHAT_HOST",
        "PORTAL_CHAT_PORT",
        "PORTAL_CHAT_DATA",
        "PORTAL_CHAT_URL",
        "PORTAL_CHAT_TOKEN",
        "PORTAL_CHAT_LOG_DIR",
    ] {
        std::env::remove_var(var);
    }
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let config_path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    config_path
}

const SAMPLE: &str = r#"
[server]
host = "0.0.0.0"
port = 8088

[storage]
path = "/tmp/portal-chat-test"

[logging]
json = true

[[participants]]
id = "alice"
display_name = "Alice"
token = "tok-alice"

[[participants]]
id = "root"
display_name = "Root"
role = "superadmin"
token = "tok-root"

[client]
base_url = "http://chat.internal:8088"
token = "tok-alice"
timeout_secs = 5
"#;

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(&temp_dir, SAMPLE);
    std::env::set_var("PORTAL_CHAT_CONFIG_PATH", config_path.to_str().unwrap());

    let config = Config::load().unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8088);
    assert_eq!(config.storage.path, "/tmp/portal-chat-test");
    assert!(config.logging.json);
    assert_eq!(config.participants.len(), 2);
    assert_eq!(config.participants[1].role, Role::Superadmin);
    assert_eq!(config.client.base_url, "http://chat.internal:8088");
    assert_eq!(config.client.token.as_deref(), Some("tok-alice"));
    assert_eq!(config.client.timeout_secs, 5);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_vars_override_file() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(&temp_dir, SAMPLE);
    std::env::set_var("PORTAL_CHAT_CONFIG_PATH", config_path.to_str().unwrap());
    std::env::set_var("PORTAL_CHAT_PORT", "9099");
    std::env::set_var("PORTAL_CHAT_DATA", "/srv/chat");
    std::env::set_var("PORTAL_CHAT_URL", "http://localhost:9099");
    std::env::set_var("PORTAL_CHAT_TOKEN", "tok-root");

    let config = Config::load().unwrap();

    assert_eq!(config.server.port, 9099);
    assert_eq!(config.storage.path, "/srv/chat");
    assert_eq!(config.client.base_url, "http://localhost:9099");
    assert_eq!(config.client.token.as_deref(), Some("tok-root"));
    // Token is scrubbed from the environment once read
    assert!(std::env::var("PORTAL_CHAT_TOKEN").is_err());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_port_env_var_fails() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(&temp_dir, SAMPLE);
    std::env::set_var("PORTAL_CHAT_CONFIG_PATH", config_path.to_str().unwrap());
    std::env::set_var("PORTAL_CHAT_PORT", "not-a-port");

    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("PORTAL_CHAT_PORT"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_duplicate_tokens_fail_load() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
[[participants]]
id = "alice"
token = "shared"

[[participants]]
id = "bob"
token = "shared"
"#,
    );
    std::env::set_var("PORTAL_CHAT_CONFIG_PATH", config_path.to_str().unwrap());

    assert!(Config::load().is_err());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_malformed_toml_fails() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(&temp_dir, "[server\nport = ");
    std::env::set_var("PORTAL_CHAT_CONFIG_PATH", config_path.to_str().unwrap());

    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));

    clear_config_env_vars();
}
