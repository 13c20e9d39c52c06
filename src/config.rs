//! Top-level configuration.
//!
//! Loaded from defaults, then a YAML file, then `THRIFTMW_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thriftmw_pool::PoolConfig;
use thriftmw_server::{ConfigError, ServerConfig};

/// Environment variable naming the YAML configuration file.
pub const CONFIG_ENV: &str = "THRIFTMW_CONFIG";

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
}

impl Config {
    /// Loads configuration from the file named by `THRIFTMW_CONFIG` if set,
    /// otherwise from defaults, then applies environment overrides and
    /// external secrets.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                tracing::info!("Loading configuration from {}", path);
                Self::from_file(path)?
            }
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.server.load_secrets()?;
        config.server.validate()?;
        Ok(config)
    }

    /// Reads a YAML file. Missing sections and fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.server.apply_env_overrides();
        self.pool.apply_env_overrides();
    }

    /// Writes the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))
    }
}
