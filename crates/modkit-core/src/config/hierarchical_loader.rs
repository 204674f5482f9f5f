//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.modkit/config.yaml, or an explicit `--config` file)
//! 3. Environment variables (MODKIT_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::ModkitConfig;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::{Mapping, Value};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "defaults.yaml";
const USER_CONFIG_FILE: &str = "config.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for user configuration and state
    config_dir: Utf8PathBuf,

    /// Config file given on the command line, replaces the user config
    explicit_file: Option<Utf8PathBuf>,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at the standard config directory (~/.modkit)
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self {
            config_dir,
            explicit_file: None,
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir,
            explicit_file: None,
        }
    }

    /// Use an explicit config file instead of `<config_dir>/config.yaml`
    pub fn with_file(mut self, file: Utf8PathBuf) -> Self {
        self.explicit_file = Some(file);
        self
    }

    /// Get the standard config directory (~/.modkit)
    fn get_config_dir() -> Result<Utf8PathBuf> {
        let home = crate::utils::get_home_dir()
            .map_err(|_| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Home directory is not UTF-8: {:?}", p)))?;
        Ok(home.join(".modkit"))
    }

    /// Directory used for user configuration
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Load configuration with hierarchical precedence
    pub fn load(&self) -> Result<ModkitConfig> {
        let mut merged = Self::load_embedded_defaults()?;

        let user_file = match &self.explicit_file {
            Some(file) => {
                if !file.exists() {
                    return Err(Error::config_not_found(file.as_str()));
                }
                Some(file.clone())
            }
            None => {
                let path = self.config_dir.join(USER_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        if let Some(path) = user_file {
            debug!("Merging config file {}", path);
            let overlay = self.load_yaml_file(&path)?;
            merged = Self::merge_values(merged, overlay);
        }

        let mut config: ModkitConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("Failed to build config: {}", e)))?;

        if config.state_dir.is_none() && self.explicit_file.is_none() {
            config.state_dir = Some(PathBuf::from(self.config_dir.as_std_path()));
        }

        self.apply_env_overrides(config)
    }

    fn load_embedded_defaults() -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(DEFAULTS_FILE).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", DEFAULTS_FILE))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", DEFAULTS_FILE))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                DEFAULTS_FILE, e
            ))
        })
    }

    fn load_yaml_file(&self, path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        match value {
            Value::Null => Ok(Value::Mapping(Mapping::new())),
            Value::Mapping(_) => Ok(value),
            _ => Err(Error::invalid_config(format!(
                "{} must contain a mapping at the top level",
                path
            ))),
        }
    }

    /// Overlay keys replace base keys
    fn merge_values(base: Value, overlay: Value) -> Value {
        match (base, overlay) {
            (Value::Mapping(mut base), Value::Mapping(overlay)) => {
                for (key, value) in overlay {
                    base.insert(key, value);
                }
                Value::Mapping(base)
            }
            (base, Value::Null) => base,
            (_, overlay) => overlay,
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut config: ModkitConfig) -> Result<ModkitConfig> {
        if let Ok(val) = env::var("MODKIT_PROJECT_ROOT") {
            config.project_root = PathBuf::from(val);
        }

        if let Ok(val) = env::var("MODKIT_MODULES_ROOT") {
            config.modules_root = PathBuf::from(val);
        }

        if let Ok(val) = env::var("MODKIT_STATE_DIR") {
            config.state_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("MODKIT_CATALOG") {
            config.catalog_file = PathBuf::from(val);
        }

        if let Ok(val) = env::var("MODKIT_MANIFEST") {
            config.manifest_file = PathBuf::from(val);
        }

        if let Ok(val) = env::var("MODKIT_SYMBOL_FILE") {
            config.symbol_file_name = val;
        }

        if let Ok(val) = env::var("MODKIT_NAMESPACE_ROOT") {
            config.namespace_root = val;
        }

        if let Ok(val) = env::var("MODKIT_RELOAD_COMMAND") {
            config.reload_command = if val.trim().is_empty() {
                None
            } else {
                Some(val)
            };
        }

        if let Ok(val) = env::var("MODKIT_JOURNAL_RETENTION") {
            config.journal_retention = val.parse().map_err(|_| {
                Error::invalid_config("MODKIT_JOURNAL_RETENTION must be a valid number")
            })?;
        }

        Ok(config)
    }
}
