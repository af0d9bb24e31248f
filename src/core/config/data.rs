use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for `cardchat serve`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct ServerConfig {
    /// Socket address the action endpoint listens on (e.g., "127.0.0.1:3000")
    pub bind_addr: Option<String>,
    /// Send headers that allow the endpoint to be embedded in any frame
    pub allow_framing: Option<bool>,
}

impl ServerConfig {
    fn is_empty(&self) -> bool {
        self.bind_addr.is_none() && self.allow_framing.is_none()
    }
}

/// On-disk configuration. Every key is optional; unset keys fall back to the
/// defaults in [`super::defaults`].
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// OpenAI-compatible API root (e.g., "https://api.openai.com/v1")
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Upper bound on a single streamed response, in seconds
    pub max_duration_secs: Option<u64>,
    /// Window in which repeated card feedback is dropped, in milliseconds
    pub debounce_ms: Option<u64>,
    /// Remote action endpoint root. When unset, card actions are handled
    /// in-process.
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "ServerConfig::is_empty")]
    pub server: ServerConfig,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths under `$HOME` to `~` notation on Unix-like systems
///
/// # Examples
/// - Unix: `/home/user/.config/cardchat/config.toml` → `~/.config/cardchat/config.toml`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
