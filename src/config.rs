use thiserror::Error;
use url::Url;

use crate::links::MAX_TTL_SECS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub links: LinkConfig,
    /// Maximum upload size in bytes
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Holds `uploads/`, `shared/`, `sessions/` and the state tables
    pub root: String,
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Prefix for every URL handed out (upload, download, short links)
    pub public_base_url: Url,
    pub upload_ttl_seconds: u64,
    pub session_ttl_seconds: u64,
    /// How often the background sweep runs; 0 disables it.
    pub cleanup_interval_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./files".to_string(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            public_base_url: Url::parse("http://localhost:8765").expect("static URL is valid"),
            upload_ttl_seconds: 30 * 60,
            session_ttl_seconds: 24 * 60 * 60,
            cleanup_interval_seconds: 5 * 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LinkConfig::default();

        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8765".to_string());
        let root = lookup("STORAGE_ROOT").unwrap_or_else(|| StorageConfig::default().root);

        let public_base_url = match lookup("PUBLIC_BASE_URL") {
            Some(raw) => Url::parse(&raw).map_err(|e| {
                ConfigError::ValidationError(format!("PUBLIC_BASE_URL is not a valid URL: {e}"))
            })?,
            None => defaults.public_base_url.clone(),
        };

        let config = Config {
            node: NodeConfig { bind_address },
            storage: StorageConfig { root },
            links: LinkConfig {
                public_base_url,
                upload_ttl_seconds: parse_number(&lookup, "UPLOAD_TTL_SECONDS", defaults.upload_ttl_seconds)?,
                session_ttl_seconds: parse_number(&lookup, "SESSION_TTL_SECONDS", defaults.session_ttl_seconds)?,
                cleanup_interval_seconds: parse_number(
                    &lookup,
                    "CLEANUP_INTERVAL_SECONDS",
                    defaults.cleanup_interval_seconds,
                )?,
            },
            max_upload_bytes: parse_number(&lookup, "MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?, // 50MB
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "STORAGE_ROOT cannot be empty".to_string(),
            ));
        }

        if !matches!(self.links.public_base_url.scheme(), "http" | "https")
            || self.links.public_base_url.cannot_be_a_base()
        {
            return Err(ConfigError::ValidationError(
                "PUBLIC_BASE_URL must be an http or https URL".to_string(),
            ));
        }

        for (name, value) in [
            ("UPLOAD_TTL_SECONDS", self.links.upload_ttl_seconds),
            ("SESSION_TTL_SECONDS", self.links.session_ttl_seconds),
        ] {
            if value == 0 || value > MAX_TTL_SECS {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 and {MAX_TTL_SECS}"
                )));
            }
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_BYTES must be greater than 0".to_string(),
            ));
        }

        if self.links.cleanup_interval_seconds == 0 {
            tracing::warn!("CLEANUP_INTERVAL_SECONDS is 0; expired links are only swept on demand");
        }

        Ok(())
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("{key} must be a non-negative integer"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.node.bind_address, "0.0.0.0:8765");
        assert_eq!(config.storage.root, "./files");
        assert_eq!(config.links.upload_ttl_seconds, 1800);
        assert_eq!(config.links.session_ttl_seconds, 86400);
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.links.public_base_url.as_str(), "http://localhost:8765/");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("STORAGE_ROOT", "/srv/drop"),
            ("PUBLIC_BASE_URL", "https://files.example.com"),
            ("UPLOAD_TTL_SECONDS", "60"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("CLEANUP_INTERVAL_SECONDS", "0"),
        ])
        .unwrap();
        assert_eq!(config.storage.root, "/srv/drop");
        assert_eq!(config.links.public_base_url.host_str(), Some("files.example.com"));
        assert_eq!(config.links.upload_ttl_seconds, 60);
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.links.cleanup_interval_seconds, 0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config_from(&[("PUBLIC_BASE_URL", "not a url")]).is_err());
        assert!(config_from(&[("PUBLIC_BASE_URL", "ftp://files.example.com")]).is_err());
        assert!(config_from(&[("UPLOAD_TTL_SECONDS", "0")]).is_err());
        assert!(config_from(&[("SESSION_TTL_SECONDS", "-5")]).is_err());
        assert!(config_from(&[("MAX_UPLOAD_BYTES", "lots")]).is_err());
    }
}
