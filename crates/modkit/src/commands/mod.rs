//! Command implementations

pub mod change;
pub mod config;
pub mod defines;
pub mod history;
pub mod list;
pub mod queue;
pub mod status;

use anyhow::{Context, Result};
use camino::Utf8Path;
use modkit_core::types::{ModkitConfig, ModuleDescriptor};
use modkit_core::HierarchicalConfigLoader;
use modkit_modules::ModuleManager;
use std::sync::Arc;
use tracing::debug;

/// Effective configuration: defaults, then the user or `--config` file, then env
pub fn load_config(file: Option<&Utf8Path>) -> Result<ModkitConfig> {
    let loader = HierarchicalConfigLoader::new().context("Failed to locate config directory")?;
    let loader = match file {
        Some(file) => loader.with_file(file.to_path_buf()),
        None => loader,
    };
    let config = loader.load().context("Failed to load configuration")?;
    debug!("Project root {:?}", config.project_root);
    Ok(config)
}

pub fn open_manager(config: &ModkitConfig) -> Result<ModuleManager> {
    ModuleManager::from_config(config).context("Failed to open module catalog")
}

/// Catalog module by namespace
pub fn find_module(manager: &ModuleManager, namespace: &str) -> Result<Arc<ModuleDescriptor>> {
    Ok(Arc::clone(manager.require_module(namespace)?))
}
