//! Server configuration from environment variables

use std::net::SocketAddr;

use crate::state::DEFAULT_CHANNEL_CAPACITY;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_PUBLIC_ORIGIN: &str = "http://localhost:8080";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Origin used to build join/present links, without trailing slash
    pub public_origin: String,
    /// Buffered snapshots per subscription scope before observers lag
    pub channel_capacity: usize,
    /// Optional directory of frontend assets
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080))),
            public_origin: DEFAULT_PUBLIC_ORIGIN.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            static_dir: None,
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl ServerConfig {
    /// Load from LIVEPOLL_* variables, falling back to defaults on missing
    /// or unparsable values
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = match env_non_empty("LIVEPOLL_BIND") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid LIVEPOLL_BIND '{}': {}, using {}", raw, e, defaults.bind);
                defaults.bind
            }),
            None => defaults.bind,
        };

        let public_origin = env_non_empty("LIVEPOLL_PUBLIC_ORIGIN")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.public_origin);

        let channel_capacity = match env_non_empty("LIVEPOLL_CHANNEL_CAPACITY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(
                        "Invalid LIVEPOLL_CHANNEL_CAPACITY '{}', using {}",
                        raw,
                        defaults.channel_capacity
                    );
                    defaults.channel_capacity
                }
            },
            None => defaults.channel_capacity,
        };

        Self {
            bind,
            public_origin,
            channel_capacity,
            static_dir: env_non_empty("LIVEPOLL_STATIC_DIR"),
        }
    }

    pub fn join_url(&self, code: &str) -> String {
        format!("{}/join/{}", self.public_origin, code)
    }

    pub fn present_url(&self, code: &str) -> String {
        format!("{}/present/{}", self.public_origin, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "LIVEPOLL_BIND",
            "LIVEPOLL_PUBLIC_ORIGIN",
            "LIVEPOLL_CHANNEL_CAPACITY",
            "LIVEPOLL_STATIC_DIR",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.public_origin, "http://localhost:8080");
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(config.static_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("LIVEPOLL_BIND", "127.0.0.1:9000");
        std::env::set_var("LIVEPOLL_PUBLIC_ORIGIN", "https://poll.example.org/");
        std::env::set_var("LIVEPOLL_CHANNEL_CAPACITY", "16");
        std::env::set_var("LIVEPOLL_STATIC_DIR", "dist");

        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.join_url("AB2C"), "https://poll.example.org/join/AB2C");
        assert_eq!(
            config.present_url("AB2C"),
            "https://poll.example.org/present/AB2C"
        );
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.static_dir.as_deref(), Some("dist"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("LIVEPOLL_BIND", "not an address");
        std::env::set_var("LIVEPOLL_CHANNEL_CAPACITY", "0");

        let config = ServerConfig::from_env();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        clear_env();
    }
}
