//! modkit configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved modkit configuration
///
/// Relative paths are interpreted against `project_root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModkitConfig {
    /// Root of the project whose modules are managed
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Directory scanned for installed modules
    #[serde(default = "default_modules_root")]
    pub modules_root: PathBuf,

    /// Per-user state directory (queue, records, journal); `~/.modkit` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Module catalog file
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,

    /// Manifest of available revisions
    #[serde(default = "default_manifest_file")]
    pub manifest_file: PathBuf,

    /// File name of the compiler symbol file
    #[serde(default = "default_symbol_file_name")]
    pub symbol_file_name: String,

    /// Namespace prefix shared by every module
    #[serde(default = "default_namespace_root")]
    pub namespace_root: String,

    /// Installation descriptor file name inside an install directory
    #[serde(default = "default_descriptor_file_name")]
    pub descriptor_file_name: String,

    /// Shell command that rebuilds the host program after define changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload_command: Option<String>,

    /// Maximum number of journal events kept after compaction
    #[serde(default = "default_journal_retention")]
    pub journal_retention: usize,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_modules_root() -> PathBuf {
    PathBuf::from("modules")
}

fn default_catalog_file() -> PathBuf {
    PathBuf::from("modkit-catalog.yaml")
}

fn default_manifest_file() -> PathBuf {
    PathBuf::from("modkit-manifest.yaml")
}

fn default_symbol_file_name() -> String {
    "modkit.rsp".to_string()
}

fn default_namespace_root() -> String {
    "Modkit.Modules".to_string()
}

fn default_descriptor_file_name() -> String {
    "module.yaml".to_string()
}

fn default_journal_retention() -> usize {
    500
}

impl Default for ModkitConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            modules_root: default_modules_root(),
            state_dir: None,
            catalog_file: default_catalog_file(),
            manifest_file: default_manifest_file(),
            symbol_file_name: default_symbol_file_name(),
            namespace_root: default_namespace_root(),
            descriptor_file_name: default_descriptor_file_name(),
            reload_command: None,
            journal_retention: default_journal_retention(),
        }
    }
}

impl ModkitConfig {
    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn modules_root_path(&self) -> PathBuf {
        self.resolve(&self.modules_root)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.resolve(&self.catalog_file)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.manifest_file)
    }

    /// State directory, falling back to `~/.modkit`
    pub fn state_dir_path(&self) -> anyhow::Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(self.resolve(dir)),
            None => Ok(crate::utils::get_home_dir()?.join(".modkit")),
        }
    }
}
