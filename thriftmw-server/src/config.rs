//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings applied by [`Processor::apply_config`](crate::Processor::apply_config).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest string, binary or container size accepted from a peer.
    pub max_message_size: usize,
    /// Reject messages without a version header.
    pub strict_read: bool,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: thriftmw_protocol::MAX_MESSAGE_SIZE,
            strict_read: false,
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Applies `THRIFTMW_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("THRIFTMW_MAX_MESSAGE_SIZE") {
            if let Ok(n) = size.parse() {
                self.max_message_size = n;
            }
        }

        self.auth.apply_env_overrides();
        self.rate_limit.apply_env_overrides();
    }

    /// Loads secrets from external files if configured.
    pub fn load_secrets(&mut self) -> Result<(), ConfigError> {
        self.auth.load_secrets()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.required && self.auth.token_hashes.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.required is set but no token hashes are configured".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_message_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Token authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Whether every call must carry a valid token.
    pub required: bool,
    /// Position of the string argument holding the token.
    pub token_arg: usize,
    /// Valid token hashes (SHA-256 hex strings).
    pub token_hashes: Vec<String>,
    /// Optional file with one token hash per line.
    pub secrets_file: Option<PathBuf>,
}

impl AuthConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(auth) = std::env::var("THRIFTMW_AUTH_REQUIRED") {
            self.required = auth == "1" || auth.eq_ignore_ascii_case("true");
        }

        if let Ok(hash) = std::env::var("THRIFTMW_AUTH_TOKEN_HASH") {
            if !hash.is_empty() {
                self.token_hashes.push(hash);
            }
        }

        if let Ok(path) = std::env::var("THRIFTMW_AUTH_SECRETS_FILE") {
            self.secrets_file = Some(PathBuf::from(path));
        }
    }

    /// Appends the hashes listed in `secrets_file`, skipping blank lines
    /// and `#` comments.
    pub fn load_secrets(&mut self) -> Result<(), ConfigError> {
        if let Some(ref path) = self.secrets_file {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(path.clone(), e))?;
            self.token_hashes.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }
        Ok(())
    }
}

/// Concurrency limit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum calls inside the middleware chain at once (0 = unlimited).
    pub max_in_flight: usize,
}

impl RateLimitConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(limit) = std::env::var("THRIFTMW_RATE_LIMIT") {
            if let Ok(n) = limit.parse() {
                self.max_in_flight = n;
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_in_flight > 0
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl ConfigError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::IoError(path, _) | ConfigError::ParseError(path, _) => Some(path),
            ConfigError::ValidationError(_) => None,
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file {:?}: {}", path, e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file {:?}: {}", path, e)
            }
            ConfigError::ValidationError(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}
