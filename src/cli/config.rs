use std::error::Error;

use crate::core::config::defaults::{
    DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_BIND_ADDR, DEFAULT_DEBOUNCE_MS,
    DEFAULT_MAX_DURATION_SECS, DEFAULT_MODEL,
};
use crate::core::config::{path_display, Config, ServerConfig};

pub fn show() -> Result<(), Box<dyn Error>> {
    let path = Config::get_config_path()?;
    let config = Config::load()?;
    if path.exists() {
        println!("Config file: {}", path_display(&path));
    } else {
        println!("Config file: {} (not created)", path_display(&path));
    }
    config.print_all();
    Ok(())
}

/// Every key spelled out, so the written file documents itself.
pub fn default_file_contents() -> Config {
    Config {
        base_url: Some(DEFAULT_BASE_URL.to_string()),
        model: Some(DEFAULT_MODEL.to_string()),
        api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
        max_duration_secs: Some(DEFAULT_MAX_DURATION_SECS),
        debounce_ms: Some(DEFAULT_DEBOUNCE_MS),
        action_url: None,
        server: ServerConfig {
            bind_addr: Some(DEFAULT_BIND_ADDR.to_string()),
            allow_framing: Some(true),
        },
    }
}

pub fn init(force: bool) -> Result<(), Box<dyn Error>> {
    let path = Config::get_config_path()?;
    if path.exists() && !force {
        eprintln!(
            "⚠️  {} already exists. Use --force to replace it.",
            path_display(&path)
        );
        return Ok(());
    }
    default_file_contents().save_to_path(&path)?;
    println!("✅ Wrote default configuration to {}", path_display(&path));
    Ok(())
}
