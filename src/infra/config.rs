//! Service configuration management.
//!
//! TOML configuration file with a manager that loads, validates, and creates
//! a default file when none exists.

use crate::infra::error::{SignError, SignResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Service configuration with all signing and serving preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Address the HTTP server binds to (e.g. "127.0.0.1:8470").
    pub bind_address: String,

    /// Root directory for journals, container blobs, and signed documents.
    pub data_dir: PathBuf,

    /// Base URL used to build verification links returned to callers.
    pub public_base_url: String,

    /// Optional pointer to the national/official validator, shown on the
    /// human verification page.
    pub official_validator_url: Option<String>,

    /// Maximum cryptographic signings in flight at once.
    pub max_concurrent_signings: usize,

    /// Tolerance in seconds applied when comparing validity windows to now.
    pub clock_skew_tolerance_secs: i64,

    /// Whether to default logging to debug level.
    pub verbose: bool,
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8470".to_string(),
            data_dir: PathBuf::from("./medsign-data"),
            public_base_url: "http://127.0.0.1:8470".to_string(),
            official_validator_url: None,
            max_concurrent_signings: 4,
            clock_skew_tolerance_secs: 300,
            verbose: false,
        }
    }
}

impl ServiceConfiguration {
    #[must_use]
    pub fn clock_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.clock_skew_tolerance_secs)
    }
}

/// Configuration manager for handling the config file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager with the default path.
    pub fn new() -> SignResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a manager with a custom path.
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Default configuration file path under the user config directory.
    pub fn default_config_path() -> SignResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("medsign").join("config.toml"))
        } else {
            Ok(PathBuf::from("medsign-config.toml"))
        }
    }

    /// Load configuration, creating the default file if it does not exist.
    pub fn load_or_create_default(&self) -> SignResult<ServiceConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = ServiceConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file.
    pub fn load(&self) -> SignResult<ServiceConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SignError::ConfigurationError(format!(
                "failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: ServiceConfiguration = toml::from_str(&content).map_err(|e| {
            SignError::ConfigurationError(format!("failed to parse config file: {e}"))
        })?;

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, config: &ServiceConfiguration) -> SignResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SignError::ConfigurationError(format!(
                    "failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SignError::ConfigurationError(format!("failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SignError::ConfigurationError(format!(
                "failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    fn validate_config(config: &ServiceConfiguration) -> SignResult<()> {
        config.bind_address.parse::<SocketAddr>().map_err(|_| {
            SignError::ConfigurationError(format!(
                "invalid bind address: {}",
                config.bind_address
            ))
        })?;

        if config.max_concurrent_signings == 0 {
            return Err(SignError::ConfigurationError(
                "max_concurrent_signings must be greater than 0".to_string(),
            ));
        }

        if config.clock_skew_tolerance_secs < 0 {
            return Err(SignError::ConfigurationError(
                "clock_skew_tolerance_secs must not be negative".to_string(),
            ));
        }

        if !config.public_base_url.starts_with("http://")
            && !config.public_base_url.starts_with("https://")
        {
            return Err(SignError::ConfigurationError(format!(
                "public_base_url must start with http:// or https://, got: {}",
                config.public_base_url
            )));
        }

        Ok(())
    }

    /// Path to the configuration file this manager handles.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = ServiceConfiguration::default();
        assert_eq!(config.max_concurrent_signings, 4);
        assert_eq!(config.clock_skew_tolerance_secs, 300);
        assert!(config.official_validator_url.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = ServiceConfiguration::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ServiceConfiguration = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.bind_address, deserialized.bind_address);
        assert_eq!(
            config.max_concurrent_signings,
            deserialized.max_concurrent_signings
        );
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());

        let loaded = manager.load().unwrap();
        assert_eq!(config.bind_address, loaded.bind_address);
    }

    #[test]
    fn test_invalid_bind_address_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        let mut config = ServiceConfiguration::default();
        config.bind_address = "not-an-address".to_string();

        let manager = ConfigManager::with_path(&config_path);
        manager.save(&config).unwrap();
        assert!(manager.load().is_err());
    }
}
