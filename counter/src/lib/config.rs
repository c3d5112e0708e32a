use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::top_k_tracker::ReplacementStrategy;

/// Environment variable naming a JSON config file for [`CounterConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "IP_TOP_CONFIG";

/// Default number of ranked addresses.
pub const DEFAULT_TOP_COUNT: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("top_count must be positive")]
    ZeroCapacity,
}

/// Construction parameters of an [`IpCounter`](crate::ip_counter::IpCounter).
///
/// Missing fields fall back to their defaults, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// How many addresses the top list keeps.
    pub top_count: usize,
    /// What a full list does with a new address that clears its floor.
    pub strategy: ReplacementStrategy,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            top_count: DEFAULT_TOP_COUNT,
            strategy: ReplacementStrategy::default(),
        }
    }
}

impl CounterConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `IP_TOP_CONFIG`, or the defaults when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// Start from `path` (or `IP_TOP_CONFIG` when no path is given) and apply
    /// command-line overrides on top.
    pub fn resolve(
        path: Option<&Path>,
        top_count: Option<usize>,
        strategy: Option<ReplacementStrategy>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::from_env()?,
        };
        if let Some(top_count) = top_count {
            config.top_count = top_count;
        }
        if let Some(strategy) = strategy {
            config.strategy = strategy;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_count == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
