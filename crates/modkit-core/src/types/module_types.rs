//! Module descriptors, installation records and status classification

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

/// Revision reported for anything that is not installed or not known
pub const UNKNOWN_REVISION: i64 = -1;

static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("symbol pattern is valid"));

/// Whether `symbol` can be written as a compiler define
pub fn is_valid_symbol(symbol: &str) -> bool {
    SYMBOL_RE.is_match(symbol)
}

/// Static metadata for one optional module
///
/// Descriptors are built once when the catalog is assembled and are never
/// persisted. Prerequisites are shared with the catalog, so cloning a
/// descriptor is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Unique identity, primary key everywhere
    pub namespace_id: String,

    /// Human readable name
    pub display_name: String,

    /// Location of the distributable package artifact
    pub package_file_path: PathBuf,

    /// Directory holding the installed module files
    pub install_path: PathBuf,

    /// Symbol toggled in the compiler symbol file
    pub compiler_define: String,

    /// Modules that must be installed first, in install order
    pub prerequisites: Vec<Arc<ModuleDescriptor>>,
}

impl ModuleDescriptor {
    pub fn new(
        namespace_id: impl Into<String>,
        display_name: impl Into<String>,
        package_file_path: impl Into<PathBuf>,
        install_path: impl Into<PathBuf>,
        compiler_define: impl Into<String>,
    ) -> Self {
        Self {
            namespace_id: namespace_id.into(),
            display_name: display_name.into(),
            package_file_path: package_file_path.into(),
            install_path: install_path.into(),
            compiler_define: compiler_define.into(),
            prerequisites: Vec::new(),
        }
    }

    /// Add a prerequisite
    pub fn with_prerequisite(mut self, prerequisite: Arc<ModuleDescriptor>) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }

    /// Namespace ids of the direct prerequisites
    pub fn prerequisite_ids(&self) -> Vec<&str> {
        self.prerequisites
            .iter()
            .map(|p| p.namespace_id.as_str())
            .collect()
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.namespace_id)
    }
}

/// Installed revision of one module, persisted per module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModuleRecord {
    pub namespace_id: String,
    pub revision: i64,
}

impl InstalledModuleRecord {
    pub fn new(namespace_id: impl Into<String>, revision: i64) -> Self {
        Self {
            namespace_id: namespace_id.into(),
            revision,
        }
    }
}

/// Latest available revision of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub namespace_id: String,
    pub revision: i64,
    #[serde(default)]
    pub author: String,
}

/// Three-state status shown next to a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    NotInstalled,
    UpdateAvailable,
    Installed,
}

impl ModuleStatus {
    /// Classify installation state.
    ///
    /// Precedence is NotInstalled, then UpdateAvailable, then Installed, so
    /// an uninstalled module is never reported as updatable.
    pub fn classify(is_installed: bool, has_update: bool) -> Self {
        if !is_installed {
            Self::NotInstalled
        } else if has_update {
            Self::UpdateAvailable
        } else {
            Self::Installed
        }
    }

    /// Single-character marker for terminal listings
    pub fn icon(&self) -> &'static str {
        match self {
            Self::NotInstalled => "○",
            Self::UpdateAvailable => "↑",
            Self::Installed => "●",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotInstalled => "not installed",
            Self::UpdateAvailable => "update available",
            Self::Installed => "installed",
        };
        f.write_str(label)
    }
}
