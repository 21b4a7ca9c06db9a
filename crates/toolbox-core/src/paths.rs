use std::path::{Path, PathBuf};

/// Plugin name the state file is derived from
pub const DEFAULT_PLUGIN_NAME: &str = "astrbot_plugin_essential";

/// Data directory used when nothing is configured, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Returns the toolbox home directory (~/.toolbox)
pub fn toolbox_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolbox")
}

/// Returns the path to toolbox.json, honouring TOOLBOX_CONFIG
pub fn config_path() -> PathBuf {
    resolve_config_path(std::env::var("TOOLBOX_CONFIG").ok())
}

/// An explicit non-blank path wins, otherwise ~/.toolbox/toolbox.json
fn resolve_config_path(explicit: Option<String>) -> PathBuf {
    match explicit {
        Some(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
        _ => toolbox_home().join("toolbox.json"),
    }
}

/// Returns the sleep state file for a plugin: `{data_dir}/{plugin_name}_data.json`
pub fn sleep_state_path(data_dir: &Path, plugin_name: &str) -> PathBuf {
    data_dir.join(format!("{}_data.json", plugin_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_path() {
        let path = sleep_state_path(Path::new(DEFAULT_DATA_DIR), DEFAULT_PLUGIN_NAME);
        assert_eq!(path, PathBuf::from("data/astrbot_plugin_essential_data.json"));
    }

    #[test]
    fn test_home_ends_with_toolbox() {
        assert!(toolbox_home().ends_with(".toolbox"));
    }

    #[test]
    fn test_config_path_defaults_to_home() {
        assert!(resolve_config_path(None).ends_with(".toolbox/toolbox.json"));
        assert!(resolve_config_path(Some("  ".into())).ends_with(".toolbox/toolbox.json"));
    }

    #[test]
    fn test_config_path_explicit() {
        assert_eq!(
            resolve_config_path(Some("/etc/toolbox.json".into())),
            PathBuf::from("/etc/toolbox.json")
        );
    }
}
