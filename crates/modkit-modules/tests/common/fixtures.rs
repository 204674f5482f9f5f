//! Temporary project fixture
//!
//! Lays out a throwaway project with three module packages, a catalog and a
//! manifest, and builds module managers over it the same way the CLI does.

#![allow(dead_code)]

use super::constants::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use modkit_core::types::{ModkitConfig, ModuleDescriptor};
use modkit_modules::ModuleManager;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct ProjectFixture {
    temp_dir: TempDir,
}

impl ProjectFixture {
    /// Project with manifest revisions Core=1, Currency=2, FeatureM=3
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let fixture = Self { temp_dir };

        let root = fixture.root().to_path_buf();
        fs::create_dir_all(root.join("packages/core")).unwrap();
        fs::write(root.join("packages/core/core.txt"), "core").unwrap();

        fs::create_dir_all(root.join("packages/feature_m/src")).unwrap();
        fs::write(root.join("packages/feature_m/src/feature.txt"), "feature m").unwrap();

        write_tarball(
            &root.join("packages/currency.tar.gz"),
            &[("ledger.txt", "currency ledger"), ("rates/eur.txt", "1.0")],
        );

        fs::write(root.join("modkit-catalog.yaml"), CATALOG_YAML).unwrap();
        fixture.write_manifest(&[(CORE_NS, 1), (CURRENCY_NS, 2), (FEATURE_M_NS, 3)]);
        fixture
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> ModkitConfig {
        ModkitConfig {
            project_root: self.root().to_path_buf(),
            state_dir: Some(self.root().join("state")),
            ..Default::default()
        }
    }

    /// Fresh manager, as a new process would build it
    pub fn manager(&self) -> ModuleManager {
        ModuleManager::from_config(&self.config()).expect("Failed to build module manager")
    }

    pub fn module(&self, manager: &ModuleManager, namespace: &str) -> Arc<ModuleDescriptor> {
        manager
            .module(namespace)
            .cloned()
            .unwrap_or_else(|| panic!("{} missing from catalog", namespace))
    }

    pub fn write_manifest(&self, revisions: &[(&str, i64)]) {
        let mut yaml = String::from("modules:\n");
        for (namespace, revision) in revisions {
            yaml.push_str(&format!(
                "  {}:\n    revision: {}\n    author: fixture\n",
                namespace, revision
            ));
        }
        fs::write(self.root().join("modkit-manifest.yaml"), yaml).unwrap();
    }

    pub fn symbol_file_path(&self) -> PathBuf {
        self.root().join(SYMBOL_FILE_NAME)
    }

    pub fn symbol_file_content(&self) -> String {
        fs::read_to_string(self.symbol_file_path()).unwrap_or_default()
    }

    pub fn install_dir(&self, name: &str) -> PathBuf {
        self.root().join("modules").join(name)
    }
}

pub fn write_tarball(path: &Path, files: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}
