//! Module catalog
//!
//! The catalog is the explicit registration list of every module this
//! distribution knows about. It is built once per process, either in code
//! through [`CatalogBuilder`] or from a YAML catalog file, and never
//! persisted. Prerequisites named by namespace are resolved into shared
//! descriptors with a depth-first walk, so a module is always registered
//! after everything it depends on.

use anyhow::{Context, Result};
use modkit_core::types::{CatalogEntry, CatalogFile, ModuleDescriptor};
use modkit_core::Error;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Every module known to the running program, in registration order
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: Vec<Arc<ModuleDescriptor>>,
    by_namespace: HashMap<String, usize>,
}

impl ModuleCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Load a catalog file, resolving relative paths against `base_dir`
    pub fn load(path: &Path, base_dir: &Path) -> Result<Self> {
        debug!("Loading module catalog from {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {:?}", path))?;
        let file: CatalogFile = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {:?}", path))?;

        let catalog = Self::from_file(file, base_dir)?;
        info!("Loaded {} modules from catalog", catalog.len());
        Ok(catalog)
    }

    /// Build a catalog from parsed catalog entries
    pub fn from_file(file: CatalogFile, base_dir: &Path) -> Result<Self> {
        let mut entries: HashMap<String, CatalogEntry> = HashMap::new();
        let mut order = Vec::new();
        for entry in file.modules {
            if entries.contains_key(&entry.namespace) {
                return Err(Error::duplicate_module(&entry.namespace).into());
            }
            order.push(entry.namespace.clone());
            entries.insert(entry.namespace.clone(), entry);
        }

        let mut resolver = PrerequisiteResolver {
            entries: &entries,
            base_dir,
            built: HashMap::new(),
            visiting: Vec::new(),
            builder: CatalogBuilder::default(),
        };
        for namespace in &order {
            resolver.visit(namespace)?;
        }

        Ok(resolver.builder.build())
    }

    /// All modules in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.modules.iter()
    }

    pub fn modules(&self) -> &[Arc<ModuleDescriptor>] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Look up a module by namespace id
    pub fn get(&self, namespace_id: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.by_namespace
            .get(namespace_id)
            .map(|&index| &self.modules[index])
    }

    /// Look up a module by namespace id, failing for unknown modules
    pub fn require(&self, namespace_id: &str) -> modkit_core::Result<&Arc<ModuleDescriptor>> {
        self.get(namespace_id)
            .ok_or_else(|| Error::unknown_module(namespace_id))
    }

    /// Find the module that owns a package artifact path
    pub fn find_by_package(&self, package_path: &Path) -> Option<&Arc<ModuleDescriptor>> {
        self.modules
            .iter()
            .find(|m| m.package_file_path == package_path)
    }
}

/// Explicit registration of module descriptors
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    modules: Vec<Arc<ModuleDescriptor>>,
    by_namespace: HashMap<String, usize>,
}

impl CatalogBuilder {
    /// Register a module, returning the shared handle used for prerequisites.
    ///
    /// Registering a namespace twice keeps the first registration.
    pub fn register(&mut self, descriptor: ModuleDescriptor) -> Arc<ModuleDescriptor> {
        if let Some(&index) = self.by_namespace.get(&descriptor.namespace_id) {
            return Arc::clone(&self.modules[index]);
        }
        let descriptor = Arc::new(descriptor);
        self.by_namespace
            .insert(descriptor.namespace_id.clone(), self.modules.len());
        self.modules.push(Arc::clone(&descriptor));
        descriptor
    }

    pub fn build(self) -> ModuleCatalog {
        ModuleCatalog {
            modules: self.modules,
            by_namespace: self.by_namespace,
        }
    }
}

struct PrerequisiteResolver<'a> {
    entries: &'a HashMap<String, CatalogEntry>,
    base_dir: &'a Path,
    built: HashMap<String, Arc<ModuleDescriptor>>,
    visiting: Vec<String>,
    builder: CatalogBuilder,
}

impl PrerequisiteResolver<'_> {
    fn visit(&mut self, namespace: &str) -> Result<Arc<ModuleDescriptor>> {
        if let Some(built) = self.built.get(namespace) {
            return Ok(Arc::clone(built));
        }

        if self.visiting.iter().any(|n| n == namespace) {
            let mut cycle = self.visiting.clone();
            cycle.push(namespace.to_string());
            return Err(Error::circular_prerequisite(cycle.join(" -> ")).into());
        }

        let entries = self.entries;
        let entry = entries
            .get(namespace)
            .ok_or_else(|| Error::unknown_module(namespace))?;

        self.visiting.push(namespace.to_string());
        let mut prerequisites = Vec::with_capacity(entry.prerequisites.len());
        for prerequisite in &entry.prerequisites {
            prerequisites.push(self.visit(prerequisite)?);
        }
        self.visiting.pop();

        let display_name = entry.display_name.clone().unwrap_or_else(|| {
            namespace
                .rsplit('.')
                .next()
                .unwrap_or(namespace)
                .to_string()
        });

        let mut descriptor = ModuleDescriptor::new(
            namespace,
            display_name,
            resolve(self.base_dir, &entry.package),
            resolve(self.base_dir, &entry.install_path),
            entry.define.clone(),
        );
        descriptor.prerequisites = prerequisites;

        let descriptor = self.builder.register(descriptor);
        self.built
            .insert(namespace.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Prerequisites of `module` in install order (deepest first), without the module itself
pub fn prerequisite_closure(module: &ModuleDescriptor) -> Vec<Arc<ModuleDescriptor>> {
    fn walk(
        module: &ModuleDescriptor,
        seen: &mut HashSet<String>,
        out: &mut Vec<Arc<ModuleDescriptor>>,
    ) {
        for prerequisite in &module.prerequisites {
            if seen.insert(prerequisite.namespace_id.clone()) {
                walk(prerequisite, seen, out);
                out.push(Arc::clone(prerequisite));
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(module, &mut seen, &mut out);
    out
}
