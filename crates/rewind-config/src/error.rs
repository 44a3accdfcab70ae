//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config at {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to render configuration as TOML: {0}")]
    RenderError(#[from] toml::ser::Error),

    /// A setting the cache cannot run with.
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        key: &'static str,
        reason: &'static str,
    },

    #[error("No home directory to place the user config in")]
    NoHomeDir,
}
