use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub events_bind_addr: String,
    pub data_dir: String,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub token_key_file: String,
    pub token_ttl_days: i64,
    pub lives: LivesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivesConfig {
    pub max_lives: u32,
    pub refill_interval_minutes: i64,
}

impl LivesConfig {
    pub fn interval_ms(&self) -> i64 {
        self.refill_interval_minutes * 60_000
    }
}

impl ServerConfig {
    /// Base URL without a trailing slash, for building shareable links.
    pub fn frontend_base(&self) -> &str {
        self.frontend_url.trim_end_matches('/')
    }
}

pub fn load_config<T: for<'de> Deserialize<'de>>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
            bind_addr = "127.0.0.1:3001"
            events_bind_addr = "127.0.0.1:3002"
            data_dir = "data"
            frontend_url = "http://localhost:3000/"
            cors_origins = ["http://localhost:3000"]
            rate_limit_per_minute = 60
            token_key_file = "data/token.key"
            token_ttl_days = 7

            [lives]
            max_lives = 6
            refill_interval_minutes = 15
        "#;
        let config: ServerConfig = toml::from_str(raw).expect("config parses");
        assert_eq!(config.lives.interval_ms(), 15 * 60 * 1000);
        assert_eq!(config.frontend_base(), "http://localhost:3000");
        assert_eq!(config.rate_limit_per_minute, 60);
    }
}
