//! Loader configuration.
//!
//! ```rust
//! use eagerly_loader::config::{LoaderConfig, MapEnvSource};
//!
//! let env = MapEnvSource::new().set("EAGERLY_BATCH_SIZE", "250");
//! let config = LoaderConfig::from_env_source(&env).unwrap();
//! assert_eq!(config.batch_size, 250);
//! ```

use std::collections::HashMap;

use tracing::info;

use crate::error::{EagerError, EagerResult};

/// Environment variable holding the batch size.
pub const BATCH_SIZE_VAR: &str = "EAGERLY_BATCH_SIZE";

/// Default number of keys sent in one batched fetch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Source for environment variables.
pub trait EnvSource: Send + Sync {
    /// Get an environment variable value.
    fn get(&self, name: &str) -> Option<String>;

    /// Check if a variable exists.
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Default environment source using std::env.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Environment source backed by a HashMap.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create a new map-based environment source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Configuration for executing eager loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of keys per batched fetch.
    ///
    /// A node whose parents carry more distinct keys issues one fetch per
    /// chunk. A constraint's limit applies to each chunk separately.
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl LoaderConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size. Zero is treated as one.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> EagerResult<Self> {
        Self::from_env_source(&StdEnvSource)
    }

    /// Load configuration from an environment source.
    pub fn from_env_source<S: EnvSource>(env: &S) -> EagerResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = env.get(BATCH_SIZE_VAR) {
            let size = raw.trim().parse::<usize>().map_err(|e| {
                EagerError::invalid_configuration(format!(
                    "{} must be a positive integer, got `{}`",
                    BATCH_SIZE_VAR, raw
                ))
                .with_source(e)
            })?;
            if size == 0 {
                return Err(EagerError::invalid_configuration(format!(
                    "{} must be greater than zero",
                    BATCH_SIZE_VAR
                )));
            }
            config.batch_size = size;
        }

        info!(batch_size = config.batch_size, "Loader configuration loaded");
        Ok(config)
    }
}
