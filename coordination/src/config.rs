//! Run configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DebateError, DebateResult};
use crate::events::DEFAULT_BUS_CAPACITY;

/// Configuration for one debate run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    /// Path of the top-level workspace
    pub root_path: String,
    /// Deepest allowed decomposition; unbounded when unset
    pub max_depth: Option<usize>,
    /// Capacity of the reference participant pool
    pub pool_capacity: usize,
    /// Broadcast capacity of the log bus
    pub bus_capacity: usize,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            root_path: "root".to_string(),
            max_depth: None,
            pool_capacity: 16,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl DebateConfig {
    /// Create from environment variables, keeping defaults for anything
    /// unset or unparsable
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DEBATE_ROOT_PATH") {
            if !path.is_empty() {
                config.root_path = path;
            }
        }
        if let Ok(depth) = std::env::var("DEBATE_MAX_DEPTH") {
            if let Ok(n) = depth.parse() {
                config.max_depth = Some(n);
            }
        }
        if let Ok(capacity) = std::env::var("DEBATE_POOL_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                config.pool_capacity = n;
            }
        }
        if let Ok(capacity) = std::env::var("DEBATE_BUS_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                config.bus_capacity = n;
            }
        }

        config
    }

    pub fn from_toml_str(raw: &str) -> DebateResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| DebateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> DebateResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DebateError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> DebateResult<()> {
        if self.root_path.is_empty() {
            return Err(DebateError::Config("root_path must not be empty".to_string()));
        }
        if self.bus_capacity == 0 {
            return Err(DebateError::Config("bus_capacity must be positive".to_string()));
        }
        Ok(())
    }
}
