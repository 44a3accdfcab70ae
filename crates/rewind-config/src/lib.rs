//! Configuration management for rewind
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence, applied by the binary)
//! 2. Environment variables (`REWIND_<SECTION>__<KEY>`)
//! 3. rewind.local.toml (gitignored, local overrides)
//! 4. rewind.toml (git-tracked, project config)
//! 5. ~/.config/rewind/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)
//!
//! Sizes are expressed in MiB/KiB and durations in milliseconds so the files
//! stay readable; the binary converts them into the cache's own config type.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE, Paths};

/// Main rewind configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindConfig {
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub sim: SimConfig,
}

/// Checkpoint cache sizing and rebuild budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memory for the whole-timeline region.
    pub global_budget_mib: u64,
    /// Memory for each of the two block regions.
    pub block_budget_mib: u64,
    pub block_len: u64,
    /// Wall-clock rebuild budget per tick.
    pub tick_budget_ms: u64,
    /// Replaces the wall-clock budget with a fixed step count when set.
    pub tick_budget_steps: Option<u64>,
    pub lookahead_frames: u64,
    pub parallel_copy_threshold_kib: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            global_budget_mib: 256,
            block_budget_mib: 128,
            block_len: 1000,
            tick_budget_ms: 8,
            tick_budget_steps: None,
            lookahead_frames: 1000,
            parallel_copy_threshold_kib: 1024,
        }
    }
}

impl CacheConfig {
    pub fn global_budget_bytes(&self) -> u64 {
        self.global_budget_mib.saturating_mul(1024 * 1024)
    }

    pub fn block_budget_bytes(&self) -> u64 {
        self.block_budget_mib.saturating_mul(1024 * 1024)
    }

    pub fn parallel_copy_threshold_bytes(&self) -> u64 {
        self.parallel_copy_threshold_kib.saturating_mul(1024)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Parameters of the reference simulation used by the `scrub` binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    /// Size of the simulated state image in bytes.
    pub state_len: usize,
    /// Initial input log length.
    pub frames: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            state_len: 64 * 1024,
            frames: 2500,
        }
    }
}

impl RewindConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parses a single TOML file, without merging any other source.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// A configuration for reproducible batch runs: step-counted ticks and no
    /// lookahead growth.
    pub fn headless() -> Self {
        Self {
            cache: CacheConfig {
                tick_budget_steps: Some(10_000),
                lookahead_frames: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;
        if cache.block_len == 0 {
            return Err(ConfigError::Invalid {
                key: "cache.block_len",
                reason: "must be positive",
            });
        }
        if cache.tick_budget_steps == Some(0)
            || (cache.tick_budget_steps.is_none() && cache.tick_budget_ms == 0)
        {
            return Err(ConfigError::Invalid {
                key: "cache.tick_budget_ms",
                reason: "a tick needs a positive time or step budget",
            });
        }
        if self.sim.state_len == 0 {
            return Err(ConfigError::Invalid {
                key: "sim.state_len",
                reason: "must be positive",
            });
        }
        if cache.global_budget_bytes() < self.sim.state_len as u64 {
            return Err(ConfigError::Invalid {
                key: "cache.global_budget_mib",
                reason: "too small to hold a single checkpoint",
            });
        }
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
