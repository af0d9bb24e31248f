use super::data::{Config, ServerConfig};
use super::defaults::{BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, MODEL_ENV};
use super::io::ConfigError;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    assert_eq!(config.model(), DEFAULT_MODEL);
    assert_eq!(config.api_key_env(), "OPENAI_API_KEY");
    assert_eq!(config.max_duration(), Duration::from_secs(300));
    assert_eq!(config.debounce(), Duration::from_millis(500));
    assert_eq!(config.action_url(), None);
    assert_eq!(
        config.bind_addr().expect("default bind addr parses").to_string(),
        "127.0.0.1:3000"
    );
    assert!(config.allow_framing());
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let config = Config {
        model: Some("gpt-4o-mini".to_string()),
        debounce_ms: Some(250),
        action_url: Some("http://localhost:3000".to_string()),
        server: ServerConfig {
            bind_addr: Some("0.0.0.0:8080".to_string()),
            allow_framing: Some(false),
        },
        ..Default::default()
    };
    config.save_to_path(&config_path).expect("save failed");

    let loaded = Config::load_from_path(&config_path).expect("load failed");
    assert_eq!(loaded, config);
    assert_eq!(loaded.debounce(), Duration::from_millis(250));
    assert!(!loaded.allow_framing());

    let cleared = Config {
        server: ServerConfig::default(),
        ..loaded
    };
    cleared.save_to_path(&config_path).expect("save failed");
    let contents = std::fs::read_to_string(&config_path).expect("read failed");
    assert!(!contents.contains("[server]"));
    assert_eq!(Config::load_from_path(&config_path).expect("load failed"), cleared);
}

#[test]
fn test_parse_error_names_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "model = [unterminated").expect("write failed");

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse config at "));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_env_overrides_replace_file_values() {
    let vars: HashMap<&str, &str> = [
        (BASE_URL_ENV, "http://localhost:11434/v1"),
        (MODEL_ENV, "llama3"),
    ]
    .into_iter()
    .collect();

    let config = Config {
        model: Some("gpt-4o".to_string()),
        ..Default::default()
    }
    .with_overrides_from(|name| vars.get(name).map(|v| v.to_string()));

    assert_eq!(config.base_url(), "http://localhost:11434/v1");
    assert_eq!(config.model(), "llama3");
}

#[test]
fn test_blank_env_values_are_ignored() {
    let config = Config {
        model: Some("gpt-4o".to_string()),
        ..Default::default()
    }
    .with_overrides_from(|_| Some("  ".to_string()));

    assert_eq!(config.model(), "gpt-4o");
    assert_eq!(config.base_url(), DEFAULT_BASE_URL);
}

#[test]
fn test_blank_action_url_means_in_process() {
    let config = Config {
        action_url: Some("   ".to_string()),
        ..Default::default()
    };
    assert_eq!(config.action_url(), None);
}

#[test]
fn test_invalid_bind_addr_is_reported() {
    let config = Config {
        server: ServerConfig {
            bind_addr: Some("not an address".to_string()),
            allow_framing: None,
        },
        ..Default::default()
    };
    assert!(config.bind_addr().is_err());
}
