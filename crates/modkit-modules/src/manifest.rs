//! Available-revision manifest
//!
//! The manifest is the read-only source of truth for the newest revision of
//! every module. It is kept apart from the installed-revision records so the
//! two can be compared.

use anyhow::{Context, Result};
use modkit_core::types::{ManifestEntry, ManifestFile, ModuleDescriptor, UNKNOWN_REVISION};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Source of the latest available revision per module
pub trait ManifestProvider {
    fn manifest_entry(&self, module: &ModuleDescriptor) -> Option<ManifestEntry>;

    /// Latest revision, or the unknown sentinel when the manifest has no entry
    fn manifest_revision(&self, module: &ModuleDescriptor) -> i64 {
        self.manifest_entry(module)
            .map(|entry| entry.revision)
            .unwrap_or(UNKNOWN_REVISION)
    }
}

/// Manifest loaded from a YAML file
#[derive(Debug, Clone, Default)]
pub struct FileManifest {
    entries: HashMap<String, ManifestEntry>,
}

impl FileManifest {
    /// Load the manifest; a missing file is an empty manifest
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No manifest at {:?}, treating as empty", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {:?}", path))?;
        let file: ManifestFile = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {:?}", path))?;

        info!("Loaded manifest with {} modules", file.modules.len());
        Ok(Self::from_file(file))
    }

    pub fn from_file(file: ManifestFile) -> Self {
        let entries = file
            .modules
            .into_iter()
            .map(|(namespace_id, entry)| {
                let manifest_entry = ManifestEntry {
                    namespace_id: namespace_id.clone(),
                    revision: entry.revision,
                    author: entry.author,
                };
                (namespace_id, manifest_entry)
            })
            .collect();
        Self { entries }
    }

    /// Insert or replace an entry
    pub fn with_entry(mut self, namespace_id: &str, revision: i64, author: &str) -> Self {
        self.entries.insert(
            namespace_id.to_string(),
            ManifestEntry {
                namespace_id: namespace_id.to_string(),
                revision,
                author: author.to_string(),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ManifestProvider for FileManifest {
    fn manifest_entry(&self, module: &ModuleDescriptor) -> Option<ManifestEntry> {
        self.entries.get(&module.namespace_id).cloned()
    }
}
