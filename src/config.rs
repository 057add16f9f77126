//! User configuration (`config.toml` in the config dir)
//!
//! ```toml
//! snapshot = "~/gateways/staging.json"
//! timeout_secs = 30
//! confirm = true
//! ```

use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";
const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gateway snapshot file; defaults to the state dir
    pub snapshot: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Ask before applying changes
    pub confirm: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot: None,
            timeout_secs: None,
            confirm: true,
        }
    }
}

impl Config {
    /// Load from the config dir, or defaults if there is no config file
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_dir()?.join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolved snapshot path
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        match &self.snapshot {
            Some(path) => Ok(paths::expand(path)),
            None => Ok(paths::state_dir()?.join(SNAPSHOT_FILE)),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.confirm);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "snapshot = \"/tmp/gw.json\"\ntimeout_secs = 15\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.snapshot_path().unwrap(), PathBuf::from("/tmp/gw.json"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
        // unset keys keep their defaults
        assert!(config.confirm);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "timeout_secs = \"soon\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
