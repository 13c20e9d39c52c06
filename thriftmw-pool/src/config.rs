//! Pool configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pool sizing and eviction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle resources kept for reuse.
    pub max_idle: usize,

    /// Maximum number of resources alive at once (0 = unlimited).
    pub max_active: usize,

    /// Idle resources older than this are destroyed on the next acquire
    /// (0 = never).
    pub idle_timeout_secs: u64,

    /// Block on exhaustion instead of failing fast.
    pub wait: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 3,
            max_active: 20,
            idle_timeout_secs: 300,
            wait: true,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Applies `THRIFTMW_POOL_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("THRIFTMW_POOL_MAX_IDLE") {
            if let Ok(n) = max.parse() {
                self.max_idle = n;
            }
        }

        if let Ok(max) = std::env::var("THRIFTMW_POOL_MAX_ACTIVE") {
            if let Ok(n) = max.parse() {
                self.max_active = n;
            }
        }

        if let Ok(timeout) = std::env::var("THRIFTMW_POOL_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(wait) = std::env::var("THRIFTMW_POOL_WAIT") {
            self.wait = wait == "true" || wait == "1";
        }
    }
}
