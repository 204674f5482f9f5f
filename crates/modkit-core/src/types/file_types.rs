//! On-disk document formats: catalog, manifest and installation descriptor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Catalog file listing every module known to this distribution
///
/// ```yaml
/// modules:
///   - namespace: Modkit.Modules.Currency
///     display_name: Currency
///     package: packages/currency.tar.gz
///     install_path: modules/currency
///     define: MODKIT_CURRENCY
///     prerequisites: [Modkit.Modules.Core]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub modules: Vec<CatalogEntry>,
}

/// One module registration in the catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub namespace: String,

    /// Defaults to the last namespace segment
    #[serde(default)]
    pub display_name: Option<String>,

    pub package: PathBuf,

    pub install_path: PathBuf,

    pub define: String,

    /// Prerequisite namespaces
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// Manifest of the latest available revisions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(default)]
    pub modules: BTreeMap<String, ManifestFileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFileEntry {
    pub revision: i64,
    #[serde(default)]
    pub author: String,
}

/// Descriptor written inside a module's install directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallDescriptor {
    pub namespace: String,
    pub revision: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}
