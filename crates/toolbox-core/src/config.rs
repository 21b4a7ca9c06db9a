use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

/// Top-level toolbox.json structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolboxConfig {
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_plugin_name() -> String {
    paths::DEFAULT_PLUGIN_NAME.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DATA_DIR)
}

impl Default for ToolboxConfig {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            data_dir: default_data_dir(),
        }
    }
}

impl ToolboxConfig {
    /// Load from a JSON config file if present, then apply env overrides.
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn from_file_or_env(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            load_config(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(
            std::env::var("TOOLBOX_PLUGIN_NAME").ok(),
            std::env::var("TOOLBOX_DATA_DIR").ok(),
        );
        Ok(config)
    }

    fn apply_overrides(&mut self, plugin_name: Option<String>, data_dir: Option<String>) {
        if let Some(name) = plugin_name.filter(|s| !s.trim().is_empty()) {
            self.plugin_name = name.trim().to_string();
        }
        if let Some(dir) = data_dir.filter(|s| !s.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir.trim());
        }
    }

    /// Path of the persisted sleep state file
    pub fn state_path(&self) -> PathBuf {
        paths::sleep_state_path(&self.data_dir, &self.plugin_name)
    }
}

/// Load and parse toolbox.json
pub fn load_config(path: &Path) -> Result<ToolboxConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: ToolboxConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(config)
}
