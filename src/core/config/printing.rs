use crate::core::config::data::Config;

fn or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(value) => value.to_string(),
        None => format!("{default} (default)"),
    }
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!(
            "  base-url: {}",
            or_default(self.base_url.as_deref(), self.base_url())
        );
        println!("  model: {}", or_default(self.model.as_deref(), self.model()));
        println!(
            "  api-key-env: {}",
            or_default(self.api_key_env.as_deref(), self.api_key_env())
        );
        match self.api_key() {
            Some(_) => println!("  api-key: set"),
            None => println!("  api-key: (missing)"),
        }
        println!("  max-duration: {}s", self.max_duration().as_secs());
        println!("  debounce: {}ms", self.debounce().as_millis());
        match self.action_url() {
            Some(url) => println!("  action-url: {url}"),
            None => println!("  action-url: (in-process)"),
        }
        match self.bind_addr() {
            Ok(addr) => println!("  server.bind-addr: {addr}"),
            Err(_) => println!(
                "  server.bind-addr: {} (invalid)",
                self.server.bind_addr.as_deref().unwrap_or_default()
            ),
        }
        match self.allow_framing() {
            true => println!("  server.allow-framing: on"),
            false => println!("  server.allow-framing: off"),
        }
    }
}
