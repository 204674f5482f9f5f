//! List command

use anyhow::{Context, Result};
use modkit_core::types::{ModkitConfig, ModuleDescriptor, ModuleStatus};
use modkit_modules::ModuleManager;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::cli::ListArgs;
use crate::output;

#[derive(Tabled, Serialize)]
pub struct ModuleRow {
    #[tabled(rename = "status")]
    #[serde(skip)]
    pub icon: String,
    pub namespace: String,
    pub name: String,
    #[tabled(skip)]
    #[serde(rename = "status")]
    pub state: ModuleStatus,
    pub installed: String,
    pub available: String,
    pub define: String,
}

impl ModuleRow {
    pub fn build(manager: &ModuleManager, module: &ModuleDescriptor) -> Self {
        let state = manager.status_icon(module);
        Self {
            icon: output::status(state).to_string(),
            namespace: module.namespace_id.clone(),
            name: module.display_name.clone(),
            state,
            installed: output::revision(manager.installed_revision(module)),
            available: output::revision(manager.manifest_revision(module)),
            define: module.compiler_define.clone(),
        }
    }
}

pub fn run(args: ListArgs, config: &ModkitConfig) -> Result<()> {
    let manager = crate::commands::open_manager(config)?;

    let rows: Vec<ModuleRow> = manager
        .all_modules()
        .iter()
        .map(|module| ModuleRow::build(&manager, module))
        .filter(|row| !args.installed || row.state != ModuleStatus::NotInstalled)
        .collect();

    if args.json {
        let json =
            serde_json::to_string_pretty(&rows).context("Failed to serialize modules to JSON")?;
        println!("{}", json);
    } else if rows.is_empty() {
        output::warn("No modules found matching criteria");
    } else {
        println!("{}", Table::new(rows));
    }

    Ok(())
}
