//! Installed module discovery
//!
//! Every installed module carries a small descriptor file in its install
//! directory. Scanning for those descriptors tells which module namespaces
//! are present; reading one gives the revision that was installed.

use anyhow::{Context, Result};
use modkit_core::types::{InstallDescriptor, InstalledModuleRecord, ModuleDescriptor};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Lists module namespaces present in the program
pub trait NamespaceScanner {
    fn scan(&self) -> Result<Vec<String>>;
}

/// Reads the installation descriptor of an installed module
pub trait InstalledInfoReader {
    fn read(&self, module: &ModuleDescriptor) -> Result<Option<InstalledModuleRecord>>;
}

/// Scans install directories for descriptor files
pub struct InstallDirScanner {
    root: PathBuf,
    descriptor_file_name: String,
    namespace_root: String,
}

/// Descriptors sit at most this deep below a scan root
const MAX_SCAN_DEPTH: usize = 3;

impl InstallDirScanner {
    pub fn new(
        modules_root: impl Into<PathBuf>,
        descriptor_file_name: impl Into<String>,
        namespace_root: impl Into<String>,
    ) -> Self {
        Self {
            root: modules_root.into(),
            descriptor_file_name: descriptor_file_name.into(),
            namespace_root: namespace_root.into(),
        }
    }

    fn in_namespace_root(&self, namespace: &str) -> bool {
        if self.namespace_root.is_empty() {
            return true;
        }
        namespace
            .strip_prefix(&self.namespace_root)
            .map(|rest| rest.is_empty() || rest.starts_with('.'))
            .unwrap_or(false)
    }
}

impl NamespaceScanner for InstallDirScanner {
    fn scan(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            debug!("Scan root {:?} does not exist", self.root);
            return Ok(Vec::new());
        }

        let mut namespaces = BTreeSet::new();
        // hidden entries hold staged or replaced installs
        let walker = WalkDir::new(&self.root)
            .max_depth(MAX_SCAN_DEPTH)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {:?}", self.root))?;
            if !entry.file_type().is_file()
                || entry.file_name() != self.descriptor_file_name.as_str()
            {
                continue;
            }

            match read_descriptor(entry.path()) {
                Ok(descriptor) if self.in_namespace_root(&descriptor.namespace) => {
                    namespaces.insert(descriptor.namespace);
                }
                Ok(descriptor) => {
                    debug!(
                        "Ignoring {} outside namespace root {}",
                        descriptor.namespace, self.namespace_root
                    );
                }
                Err(e) => warn!("Skipping unreadable descriptor {:?}: {:#}", entry.path(), e),
            }
        }

        Ok(namespaces.into_iter().collect())
    }
}

/// Reads `<install_path>/<descriptor_file_name>`
pub struct DescriptorReader {
    descriptor_file_name: String,
}

impl DescriptorReader {
    pub fn new(descriptor_file_name: impl Into<String>) -> Self {
        Self {
            descriptor_file_name: descriptor_file_name.into(),
        }
    }

    pub fn descriptor_path(&self, module: &ModuleDescriptor) -> PathBuf {
        module.install_path.join(&self.descriptor_file_name)
    }
}

impl InstalledInfoReader for DescriptorReader {
    fn read(&self, module: &ModuleDescriptor) -> Result<Option<InstalledModuleRecord>> {
        let path = self.descriptor_path(module);
        if !path.exists() {
            return Ok(None);
        }

        let descriptor = read_descriptor(&path)?;
        if descriptor.namespace != module.namespace_id {
            warn!(
                "Descriptor {:?} names {} but belongs to {}",
                path, descriptor.namespace, module.namespace_id
            );
            return Ok(None);
        }

        Ok(Some(InstalledModuleRecord::new(
            descriptor.namespace,
            descriptor.revision,
        )))
    }
}

pub fn read_descriptor(path: &Path) -> Result<InstallDescriptor> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read descriptor {:?}", path))?;
    serde_yaml_ng::from_str(&content).with_context(|| format!("Failed to parse descriptor {:?}", path))
}

pub fn write_descriptor(path: &Path, descriptor: &InstallDescriptor) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let content = serde_yaml_ng::to_string(descriptor).context("Failed to serialize descriptor")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write descriptor {:?}", path))
}
