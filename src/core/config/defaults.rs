use std::net::SocketAddr;
use std::time::Duration;

use crate::core::config::data::Config;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_MAX_DURATION_SECS: u64 = 300;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV: &str = "CARDCHAT_MODEL";

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs.unwrap_or(DEFAULT_MAX_DURATION_SECS))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }

    pub fn action_url(&self) -> Option<&str> {
        self.action_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.server
            .bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
    }

    pub fn allow_framing(&self) -> bool {
        self.server.allow_framing.unwrap_or(true)
    }

    /// Applies `OPENAI_BASE_URL` and `CARDCHAT_MODEL` on top of the file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    pub(crate) fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(base_url) = non_blank(BASE_URL_ENV) {
            self.base_url = Some(base_url);
        }
        if let Some(model) = non_blank(MODEL_ENV) {
            self.model = Some(model);
        }
        self
    }
}
