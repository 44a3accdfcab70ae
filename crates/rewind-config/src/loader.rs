//! Configuration loader with multi-source merging

use crate::{Paths, RewindConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Loads [`RewindConfig`] from defaults, files and the environment.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// A loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "REWIND".to_string(),
            user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "REWIND")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip `~/.config/rewind/config.toml`. Keeps tests hermetic.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Merges every source, later ones overriding earlier ones:
    ///
    /// 1. built-in defaults
    /// 2. user config file
    /// 3. `rewind.toml` in the project directory
    /// 4. `rewind.local.toml` in the project directory
    /// 5. `REWIND_<SECTION>__<KEY>` environment variables
    pub fn load(self) -> Result<RewindConfig> {
        let toml_file = |path: PathBuf| {
            config::File::from(path)
                .required(false)
                .format(config::FileFormat::Toml)
        };
        let mut builder = config::Config::builder();

        let defaults = RewindConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        if self.user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                builder = builder.add_source(toml_file(user_config_file));
            }
        }

        builder = builder
            .add_source(toml_file(Paths::project_config_file(&self.project_dir)))
            .add_source(toml_file(Paths::local_config_file(&self.project_dir)));

        // Keys contain underscores, so sections are split on a double underscore.
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let rewind_config: RewindConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        rewind_config.validate()?;

        Ok(rewind_config)
    }

    /// Load configuration or return defaults if anything goes wrong
    pub fn load_or_default(self) -> RewindConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("REWIND_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.cache.block_len, 1000);
        assert_eq!(config.cache.tick_budget_ms, 8);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("rewind.toml"),
            r#"
[cache]
global_budget_mib = 64
block_len = 500
tick_budget_steps = 2000

[sim]
seed = 42
"#,
        )
        .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.cache.global_budget_mib, 64);
        assert_eq!(config.cache.block_len, 500);
        assert_eq!(config.cache.tick_budget_steps, Some(2000));
        assert_eq!(config.cache.block_budget_mib, 128, "untouched keys keep defaults");
        assert_eq!(config.sim.seed, 42);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("rewind.toml"),
            "[logging]\nfilter = \"debug\"\n",
        )
        .expect("Failed to write project config");
        fs::write(
            project_dir.join("rewind.local.toml"),
            "[logging]\nfilter = \"rewind=trace\"\n",
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");
        assert_eq!(config.logging.filter, "rewind=trace");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();
        fs::write(project_dir.join("rewind.toml"), "[cache]\nblock_len = 0\n")
            .expect("Failed to write config");

        assert!(loader(project_dir).load().is_err());
        assert_eq!(loader(project_dir).load_or_default().cache.block_len, 1000);
    }
}
