//! Configuration management for lifeline.
//!
//! Configuration is loaded with precedence:
//! 1. `LIFELINE_CONFIG` (path to a config file)
//! 2. Config file (`<data dir>/config.toml`)
//! 3. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lifeline_core::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session lifecycle tunables
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Paths
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for lifeline data (backup and mirrored sessions)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "lifeline", "lifeline") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lifeline")
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config
            .sessions
            .validate()
            .context("Invalid [sessions] configuration")?;
        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("LIFELINE_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Directory the file adapter stores blobs in.
    pub fn store_dir(&self) -> PathBuf {
        self.paths.data_dir.join("store")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.data_dir)
            .context("Failed to create data directory")?;
        std::fs::create_dir_all(self.store_dir()).context("Failed to create store directory")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sessions.session_timeout_secs, 1800);
        assert_eq!(config.sessions.max_history, 50);
        assert!(config.store_dir().ends_with("store"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.sessions.backup_key, "lifeline:session_backup");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");
        std::fs::write(
            &path,
            format!(
                "[sessions]\nsession_timeout_secs = 600\n\n[paths]\ndata_dir = {:?}\n",
                data_dir.display().to_string()
            ),
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sessions.session_timeout_secs, 600);
        assert_eq!(config.sessions.cleanup_interval_secs, 300);
        assert_eq!(config.paths.data_dir, data_dir);

        config.ensure_dirs().unwrap();
        assert!(config.store_dir().is_dir());
    }

    #[test]
    fn test_invalid_sessions_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sessions]\nmax_history = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sessions.max_history, config.sessions.max_history);
        assert_eq!(parsed.paths.data_dir, config.paths.data_dir);
    }
}
