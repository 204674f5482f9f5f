//! Status command

use anyhow::{Context, Result};
use modkit_core::types::{ModkitConfig, ModuleStatus};
use serde::Serialize;

use crate::cli::StatusArgs;
use crate::commands::{find_module, open_manager};
use crate::output;

#[derive(Serialize)]
struct ModuleReport {
    namespace: String,
    name: String,
    status: ModuleStatus,
    installed_revision: i64,
    available_revision: i64,
    has_package: bool,
    define: String,
    define_enabled: bool,
    prerequisites: Vec<String>,
    missing_prerequisites: Vec<String>,
}

pub fn run(args: StatusArgs, config: &ModkitConfig) -> Result<()> {
    let manager = open_manager(config)?;
    let module = find_module(&manager, &args.namespace)?;

    let report = ModuleReport {
        namespace: module.namespace_id.clone(),
        name: module.display_name.clone(),
        status: manager.status_icon(&module),
        installed_revision: manager.installed_revision(&module),
        available_revision: manager.manifest_revision(&module),
        has_package: manager.has_package(&module),
        define: module.compiler_define.clone(),
        define_enabled: manager.has_define(&module),
        prerequisites: module
            .prerequisite_ids()
            .into_iter()
            .map(str::to_string)
            .collect(),
        missing_prerequisites: manager
            .tracker()
            .missing_prerequisites(&module)
            .iter()
            .map(|m| m.namespace_id.clone())
            .collect(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize status")?;
        println!("{}", json);
        return Ok(());
    }

    output::header(&module.to_string());
    output::kv("Status", &output::status(report.status).to_string());
    output::kv("Installed", &output::revision(report.installed_revision));
    output::kv("Available", &output::revision(report.available_revision));
    output::kv(
        "Package",
        &format!(
            "{} ({})",
            module.package_file_path.display(),
            if report.has_package { "present" } else { "missing" }
        ),
    );
    output::kv("Install path", &module.install_path.display().to_string());
    output::kv(
        "Define",
        &format!(
            "{} ({})",
            report.define,
            if report.define_enabled { "enabled" } else { "disabled" }
        ),
    );
    if !report.prerequisites.is_empty() {
        output::kv("Prerequisites", &report.prerequisites.join(", "));
    }
    if !report.missing_prerequisites.is_empty() {
        output::warn(&format!(
            "Missing prerequisites: {}",
            report.missing_prerequisites.join(", ")
        ));
    }

    Ok(())
}
