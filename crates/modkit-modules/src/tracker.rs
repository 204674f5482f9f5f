//! Installation state tracking
//!
//! Answers whether a module is installed, which revision is installed and
//! whether an update is available. Queries are cheap enough to run on every
//! UI refresh: the set of present namespaces is scanned once and cached for
//! the life of the process, and installed revisions are read from the store
//! instead of from each module's install directory.
//!
//! Queries never fail. Anything that cannot be determined is reported as
//! not installed, revision [`UNKNOWN_REVISION`] or no update.

use crate::catalog::prerequisite_closure;
use crate::context::OrchestrationContext;
use crate::discovery::{InstalledInfoReader, NamespaceScanner};
use crate::manifest::ManifestProvider;
use crate::store::{KeyValueStore, KeyValueStoreExt};
use anyhow::Result;
use modkit_core::types::{
    InstalledModuleRecord, ManifestEntry, ModuleDescriptor, UNKNOWN_REVISION,
};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

const RECORD_PREFIX: &str = "installed/";

fn record_key(namespace_id: &str) -> String {
    format!("{}{}", RECORD_PREFIX, namespace_id)
}

pub struct InstallationTracker {
    store: Arc<dyn KeyValueStore>,
    manifest: Box<dyn ManifestProvider>,
    reader: Box<dyn InstalledInfoReader>,
    scanner: Box<dyn NamespaceScanner>,
    namespaces: RwLock<Vec<String>>,
}

impl InstallationTracker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        manifest: Box<dyn ManifestProvider>,
        reader: Box<dyn InstalledInfoReader>,
        scanner: Box<dyn NamespaceScanner>,
    ) -> Self {
        Self {
            store,
            manifest,
            reader,
            scanner,
            namespaces: RwLock::new(Vec::new()),
        }
    }

    /// Rescan present namespaces and replace the cached set
    pub fn refresh_namespace_cache(&self) -> Vec<String> {
        let mut namespaces = match self.scanner.scan() {
            Ok(namespaces) => namespaces,
            Err(e) => {
                warn!("Namespace scan failed: {:#}", e);
                Vec::new()
            }
        };
        namespaces.sort();
        namespaces.dedup();
        debug!("Namespace cache refreshed: {} namespaces", namespaces.len());

        if let Ok(mut cache) = self.namespaces.write() {
            *cache = namespaces.clone();
        }
        namespaces
    }

    /// Cached namespaces, scanning first when the cache is empty
    pub fn namespaces(&self) -> Vec<String> {
        let cached = self
            .namespaces
            .read()
            .map(|cache| cache.clone())
            .unwrap_or_default();
        if cached.is_empty() {
            self.refresh_namespace_cache()
        } else {
            cached
        }
    }

    pub fn is_installed(&self, module: &ModuleDescriptor) -> bool {
        self.namespaces()
            .binary_search(&module.namespace_id)
            .is_ok()
    }

    /// Latest available revision, or the unknown sentinel
    pub fn manifest_revision(&self, module: &ModuleDescriptor) -> i64 {
        self.manifest.manifest_revision(module)
    }

    pub fn manifest_entry(&self, module: &ModuleDescriptor) -> Option<ManifestEntry> {
        self.manifest.manifest_entry(module)
    }

    /// Revision of the module as the rest of the system should see it.
    ///
    /// While a change is being processed this is the manifest revision,
    /// the revision the module is becoming.
    pub fn installed_revision(&self, ctx: &OrchestrationContext, module: &ModuleDescriptor) -> i64 {
        if ctx.processing {
            return self.manifest_revision(module);
        }

        if !self.is_installed(module) {
            return UNKNOWN_REVISION;
        }

        let key = record_key(&module.namespace_id);
        match self.store.get_raw(&key) {
            Ok(Some(value)) => self.revision_from_stored(module, &key, value),
            Ok(None) => self.record_from_disk(module, &key),
            Err(e) => {
                warn!(
                    "Could not read installed record for {}: {:#}",
                    module.namespace_id, e
                );
                UNKNOWN_REVISION
            }
        }
    }

    fn revision_from_stored(&self, module: &ModuleDescriptor, key: &str, value: Value) -> i64 {
        let record = match value {
            Value::Null => None,
            value => serde_json::from_value::<InstalledModuleRecord>(value)
                .ok()
                .filter(|record| record.namespace_id == module.namespace_id),
        };

        match record {
            Some(record) => record.revision,
            None => {
                warn!(
                    "Purging stale installed record for {}",
                    module.namespace_id
                );
                if let Err(e) = self.store.remove(key) {
                    warn!("Failed to purge {}: {:#}", key, e);
                }
                UNKNOWN_REVISION
            }
        }
    }

    fn record_from_disk(&self, module: &ModuleDescriptor, key: &str) -> i64 {
        match self.reader.read(module) {
            Ok(Some(record)) => {
                debug!(
                    "Caching installed record for {} at revision {}",
                    module.namespace_id, record.revision
                );
                if let Err(e) = self.store.set(key, &record) {
                    warn!("Failed to cache record for {}: {:#}", module.namespace_id, e);
                }
                record.revision
            }
            Ok(None) => UNKNOWN_REVISION,
            Err(e) => {
                warn!(
                    "Could not read installation descriptor for {}: {:#}",
                    module.namespace_id, e
                );
                UNKNOWN_REVISION
            }
        }
    }

    pub fn has_update(&self, ctx: &OrchestrationContext, module: &ModuleDescriptor) -> bool {
        self.is_installed(module)
            && self.installed_revision(ctx, module) < self.manifest_revision(module)
    }

    /// Prerequisites, transitively and in install order, that are not installed
    pub fn missing_prerequisites(&self, module: &ModuleDescriptor) -> Vec<Arc<ModuleDescriptor>> {
        prerequisite_closure(module)
            .into_iter()
            .filter(|prerequisite| !self.is_installed(prerequisite))
            .collect()
    }

    /// Stored record for a module, if any
    pub fn installed_record(&self, namespace_id: &str) -> Option<InstalledModuleRecord> {
        self.store
            .get_or::<Option<InstalledModuleRecord>>(&record_key(namespace_id), None)
            .ok()
            .flatten()
    }

    /// Persist the record after a successful install or update
    pub fn record_installed(&self, record: &InstalledModuleRecord) -> Result<()> {
        info!(
            "Recording {} at revision {}",
            record.namespace_id, record.revision
        );
        self.store.set(&record_key(&record.namespace_id), record)
    }

    /// Drop the record after an uninstall
    pub fn forget(&self, namespace_id: &str) -> Result<()> {
        info!("Forgetting installed record for {}", namespace_id);
        self.store.remove(&record_key(namespace_id))
    }
}
