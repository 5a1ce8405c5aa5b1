// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Everything is optional; defaults give a working local setup

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the thread database
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Agent bound to newly created threads
    #[serde(default = "default_agent")]
    pub default_agent: String,
}

fn default_agent() -> String {
    "echo".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_agent: default_agent(),
        }
    }
}

impl Config {
    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let mut config = if Path::new(config_path).exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config.toml")?;
            toml::from_str::<Config>(&content).context("Failed to parse config.toml")?
        } else {
            Config::default()
        };

        if let Ok(val) = std::env::var("PARLEY_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("PARLEY_AGENT") {
            config.default_agent = val;
        }

        Ok(config)
    }

    /// Resolved data directory: configured path or the platform default
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let dirs = ProjectDirs::from("com", "parley", "parley")
            .context("Could not determine platform data directory")?;
        Ok(dirs.data_dir().to_path_buf())
    }
}
