//! Configuration loading and resolution
//!
//! Every setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Layers 1 and 2 are collected by the binary (clap with `env`) into a
//! [`ConfigLayer`]; this module merges it over the file layer and applies
//! the defaults.

use crate::{Error, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 60;
pub const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;

/// One layer of optional settings
///
/// Used both for the TOML file contents and for the CLI/env overrides.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub database: Option<PathBuf>,
    pub bind: Option<String>,
    pub jwt_secret: Option<String>,
    pub access_token_minutes: Option<i64>,
    pub refresh_token_days: Option<i64>,
    pub ipinfo_token: Option<String>,
    pub page_size: Option<i64>,
    pub cors_origins: Option<Vec<String>>,
}

impl ConfigLayer {
    /// Fill every unset field of `self` from `lower`
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            database: self.database.or(lower.database),
            bind: self.bind.or(lower.bind),
            jwt_secret: self.jwt_secret.or(lower.jwt_secret),
            access_token_minutes: self.access_token_minutes.or(lower.access_token_minutes),
            refresh_token_days: self.refresh_token_days.or(lower.refresh_token_days),
            ipinfo_token: self.ipinfo_token.or(lower.ipinfo_token),
            page_size: self.page_size.or(lower.page_size),
            cors_origins: self.cors_origins.or(lower.cors_origins),
        }
    }

    /// Parse a layer from TOML text
    pub fn from_toml(content: &str) -> Result<ConfigLayer> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub jwt_secret: String,
    /// True when no secret was configured and one was generated for this process
    pub jwt_secret_generated: bool,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub ipinfo_token: Option<String>,
    pub page_size: i64,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Resolve configuration from CLI/env overrides and an optional config file
    ///
    /// An explicitly named config file must exist; the platform default
    /// location is used only when present.
    pub fn resolve(overrides: ConfigLayer, config_file: Option<&Path>) -> Result<Config> {
        let file_layer = match config_file {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
                })?;
                ConfigLayer::from_toml(&content)?
            }
            None => match default_config_file() {
                Some(path) => ConfigLayer::from_toml(&std::fs::read_to_string(path)?)?,
                None => ConfigLayer::default(),
            },
        };

        Config::from_layer(overrides.or(file_layer))
    }

    /// Apply compiled defaults to a merged layer
    pub fn from_layer(layer: ConfigLayer) -> Result<Config> {
        let page_size = layer.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size < 1 {
            return Err(Error::Config(format!("page_size must be positive, got {}", page_size)));
        }

        let access_token_minutes = layer
            .access_token_minutes
            .unwrap_or(DEFAULT_ACCESS_TOKEN_MINUTES);
        let refresh_token_days = layer.refresh_token_days.unwrap_or(DEFAULT_REFRESH_TOKEN_DAYS);
        if access_token_minutes < 1 || refresh_token_days < 1 {
            return Err(Error::Config("Token lifetimes must be positive".to_string()));
        }

        let (jwt_secret, jwt_secret_generated) = match layer.jwt_secret {
            Some(secret) if !secret.trim().is_empty() => (secret, false),
            _ => (generate_secret(), true),
        };

        Ok(Config {
            database_path: layer.database.unwrap_or_else(default_database_path),
            bind_addr: layer.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            jwt_secret,
            jwt_secret_generated,
            access_token_minutes,
            refresh_token_days,
            ipinfo_token: layer.ipinfo_token.filter(|t| !t.trim().is_empty()),
            page_size,
            cors_origins: layer.cors_origins.unwrap_or_default(),
        })
    }
}

/// Platform config file location, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("fieldnet").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/fieldnet/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fieldnet").join("fieldnet.db"))
        .unwrap_or_else(|| PathBuf::from("./fieldnet_data/fieldnet.db"))
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_priority_over_file() {
        let cli = ConfigLayer {
            bind: Some("0.0.0.0:9000".to_string()),
            ..Default::default()
        };
        let file = ConfigLayer::from_toml(
            r#"
            bind = "127.0.0.1:7000"
            page_size = 25
            "#,
        )
        .unwrap();

        let config = Config::from_layer(cli.or(file)).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_layer(ConfigLayer::default()).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.access_token_minutes, DEFAULT_ACCESS_TOKEN_MINUTES);
        assert!(config.jwt_secret_generated);
        assert_eq!(config.jwt_secret.len(), 48);
        assert!(config.ipinfo_token.is_none());
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_blank_secret_is_regenerated() {
        let layer = ConfigLayer {
            jwt_secret: Some("   ".to_string()),
            ..Default::default()
        };
        let config = Config::from_layer(layer).unwrap();
        assert!(config.jwt_secret_generated);
    }

    #[test]
    fn test_invalid_page_size_rejected() {
        let layer = ConfigLayer {
            page_size: Some(0),
            ..Default::default()
        };
        assert!(Config::from_layer(layer).is_err());
    }

    #[test]
    fn test_unknown_toml_type_rejected() {
        assert!(ConfigLayer::from_toml("page_size = \"ten\"").is_err());
    }

    #[test]
    fn test_resolve_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldnet.toml");
        std::fs::write(
            &path,
            r#"
            database = "/tmp/fieldnet-config-test.db"
            jwt_secret = "file-secret"
            cors_origins = ["http://localhost:3000"]
            "#,
        )
        .unwrap();

        let config = Config::resolve(ConfigLayer::default(), Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/fieldnet-config-test.db"));
        assert_eq!(config.jwt_secret, "file-secret");
        assert!(!config.jwt_secret_generated);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000".to_string()]);
    }

    #[test]
    fn test_resolve_missing_explicit_file_fails() {
        let result = Config::resolve(
            ConfigLayer::default(),
            Some(Path::new("/nonexistent/fieldnet/config.toml")),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
