use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const KEY_API_URL: &str = "api_url";
pub const KEY_API_TOKEN: &str = "api_token";

/// Keys the rest of the app actually reads. Anything else is accepted but
/// flagged by the config command.
pub const KNOWN_KEYS: [&str; 2] = [KEY_API_URL, KEY_API_TOKEN];

/// Flat key-value configuration persisted as TOML.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub map: BTreeMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load from the default location, falling back to an empty config when
    /// the config directory cannot be determined.
    pub fn load_default() -> Self {
        match config_path() {
            Ok(path) => Self::load(&path).unwrap_or_else(|err| {
                tracing::warn!("{err:#}");
                Self::default()
            }),
            Err(err) => {
                tracing::warn!("{err:#}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn api_url(&self) -> Option<&str> {
        self.map.get(KEY_API_URL).map(String::as_str)
    }

    pub fn api_token(&self) -> Option<String> {
        self.map.get(KEY_API_TOKEN).cloned()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("ironlog").join("config.toml"))
}
