//! Config file locations

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "rewind.toml";

/// Gitignored per-machine overrides.
pub const LOCAL_CONFIG_FILE: &str = "rewind.local.toml";

/// Where rewind looks for configuration files.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("dev", "Rewind", "rewind"),
        }
    }

    /// User config directory (`~/.config/rewind/` on Linux).
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoHomeDir)
    }

    /// User config file (`~/.config/rewind/config.toml` on Linux).
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(PROJECT_CONFIG_FILE)
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(LOCAL_CONFIG_FILE)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn user_paths_mention_rewind() {
        let paths = Paths::new();

        // Platforms without a home directory report an error instead.
        if let Ok(file) = paths.user_config_file() {
            assert!(file.to_string_lossy().contains("rewind"));
            assert!(file.ends_with("config.toml"));
        }
    }

    #[test]
    fn project_files_live_in_project_dir() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        assert_eq!(
            Paths::project_config_file(project_dir),
            project_dir.join("rewind.toml")
        );
        assert_eq!(
            Paths::local_config_file(project_dir),
            project_dir.join("rewind.local.toml")
        );
    }
}
