//! TOML file configuration structures.
//!
//! These structs directly map to the `bookstore-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub mono: MonoConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default address")
}

/// Monobank acquiring section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonoConfig {
    /// Acquiring API root.
    #[serde(default = "default_api_base")]
    pub api_base: Url,
    /// Merchant key sent in the `X-Token` header.
    pub token: String,
    /// Publicly reachable URL of this server's callback endpoint,
    /// passed to Monobank as `webHookUrl` on every invoice.
    pub webhook_url: Url,
}

fn default_api_base() -> Url {
    Url::parse("https://api.monobank.ua").expect("valid default URL")
}

/// Listing cache section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL backstop for cached listing responses, in seconds. The cache
    /// is cleared eagerly on every catalog mutation; the TTL only bounds
    /// staleness from writes that bypass this process.
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_secs: default_listing_ttl_secs(),
        }
    }
}

fn default_listing_ttl_secs() -> u64 {
    60
}

/// Orphan sweep section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// How often the sweeper wakes up, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    /// How old an invoice-less order must be before it is reported,
    /// in seconds.
    #[serde(default = "default_sweep_min_age_secs")]
    pub min_age_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            min_age_secs: default_sweep_min_age_secs(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_sweep_min_age_secs() -> u64 {
    900
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[mono]
api_base = "https://api.monobank.ua"
token = "uABCDEFtoken"
webhook_url = "https://shop.example.com/api/monobank/callback"

[cache]
listing_ttl_secs = 30

[sweep]
interval_secs = 120
min_age_secs = 300
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.mono.token, "uABCDEFtoken");
        assert_eq!(
            config.mono.webhook_url.as_str(),
            "https://shop.example.com/api/monobank/callback"
        );
        assert_eq!(config.cache.listing_ttl_secs, 30);
        assert_eq!(config.sweep.interval_secs, 120);
        assert_eq!(config.sweep.min_age_secs, 300);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[mono]
token = "uABCDEFtoken"
webhook_url = "https://shop.example.com/api/monobank/callback"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.mono.api_base.as_str(), "https://api.monobank.ua/");
        assert_eq!(config.cache.listing_ttl_secs, 60);
        assert_eq!(config.sweep.interval_secs, 600);
        assert_eq!(config.sweep.min_age_secs, 900);
    }

    #[test]
    fn test_invalid_webhook_url_is_rejected() {
        let toml_str = r#"
[mono]
token = "uABCDEFtoken"
webhook_url = "not a url"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
