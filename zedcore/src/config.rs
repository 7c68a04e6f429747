use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ZedError, ZedResult},
    field,
    magic::{
        DEFAULT_CHILD_FIELD, DEFAULT_FRAME_THRESH, DEFAULT_KEY_FIELD, ENV_ZED_CONFIG_PATH,
        MAX_CALL_DEPTH,
    },
    order::Order,
};

/// Defaults for microindex writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub frame_thresh: usize,
    pub keys: Vec<field::Path>,
    pub order: Order,
    pub child_field: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            frame_thresh: DEFAULT_FRAME_THRESH,
            keys: vec![field::Path::new([DEFAULT_KEY_FIELD])],
            order: Order::Asc,
            child_field: DEFAULT_CHILD_FIELD.to_string(),
        }
    }
}

/// Limits for expression evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExprConfig {
    pub max_call_depth: usize,
}

impl Default for ExprConfig {
    fn default() -> Self {
        Self {
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

/// Process configuration, stored as TOML:
///
/// ```toml
/// [index]
/// frame_thresh = 32768
/// keys = ["ts"]
/// order = "desc"
///
/// [expr]
/// max_call_depth = 1000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZedConfig {
    pub index: IndexConfig,
    pub expr: ExprConfig,
}

impl ZedConfig {
    /// Get the default path to the ZED configuration file.
    pub fn default_path() -> PathBuf {
        if let Ok(config_path) = std::env::var(ENV_ZED_CONFIG_PATH) {
            return config_path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push("zed");
        path.push("config.toml");
        path
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> ZedResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;

        toml::from_str(&toml_str).map_err(|e| ZedError::ConfigParse {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save_to_toml(&self, path: &Path) -> ZedResult<()> {
        let toml_str = toml::to_string(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Load from [`ZedConfig::default_path`], falling back to defaults when the
    /// file is absent or unreadable.
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_toml(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Ignoring configuration at `{}`: {}; using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = ZedConfig::default();
        config.index.frame_thresh = 1024;
        config.index.order = Order::Desc;
        config.index.keys = vec!["ts".parse().unwrap(), "id.src".parse().unwrap()];
        config.save_to_toml(&path).unwrap();

        let loaded = ZedConfig::load_from_toml(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[expr]\nmax_call_depth = 5\n").unwrap();
        let loaded = ZedConfig::load_from_toml(&path).unwrap();
        assert_eq!(loaded.expr.max_call_depth, 5);
        assert_eq!(loaded.index, IndexConfig::default());
    }

    #[test]
    fn bad_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[index]\nframe_thresh = \"big\"\n").unwrap();
        assert!(ZedConfig::load_from_toml(&path).unwrap_err().is_config_parse());
    }
}
