//! Queued change requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Direction of a queued change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFlow {
    Install,
    Update,
    Uninstall,
}

impl fmt::Display for ChangeFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Uninstall => "uninstall",
        };
        f.write_str(label)
    }
}

/// One pending install, update or uninstall
///
/// The target module is named by its package path rather than its
/// namespace, which stays resolvable while the module's own code is
/// switched off.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub module_package_path: PathBuf,
    pub flow: ChangeFlow,
}

impl ChangeRequest {
    pub fn new(module_package_path: impl Into<PathBuf>, flow: ChangeFlow) -> Self {
        Self {
            module_package_path: module_package_path.into(),
            flow,
        }
    }

    pub fn install(module_package_path: impl Into<PathBuf>) -> Self {
        Self::new(module_package_path, ChangeFlow::Install)
    }

    pub fn update(module_package_path: impl Into<PathBuf>) -> Self {
        Self::new(module_package_path, ChangeFlow::Update)
    }

    pub fn uninstall(module_package_path: impl Into<PathBuf>) -> Self {
        Self::new(module_package_path, ChangeFlow::Uninstall)
    }
}

impl fmt::Display for ChangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flow, self.module_package_path.display())
    }
}
