//! Install, update and uninstall commands
//!
//! These only queue changes. With `--now` the queue is worked right away,
//! otherwise `modkit queue run` does it later.

use anyhow::{anyhow, Result};
use modkit_core::types::ModkitConfig;
use modkit_modules::{AddOutcome, ModuleManager};

use crate::cli::{InstallArgs, ModuleArgs};
use crate::commands::{find_module, open_manager, queue};
use crate::output;

pub fn install(args: InstallArgs, config: &ModkitConfig) -> Result<()> {
    let manager = open_manager(config)?;
    let module = find_module(&manager, &args.namespace)?;

    if manager.is_installed(&module) {
        output::info(&format!("{} is already installed", module));
        return Ok(());
    }

    let added = manager.enqueue_install(&module, !args.no_deps)?;
    if added.is_empty() {
        output::info(&format!("{} is already queued", module));
    }
    for request in &added {
        output::success(&format!("Queued {}", describe(&manager, request)));
    }

    finish(&manager, args.now)
}

pub fn update(args: ModuleArgs, config: &ModkitConfig) -> Result<()> {
    let manager = open_manager(config)?;
    let module = find_module(&manager, &args.namespace)?;

    if !manager.is_installed(&module) {
        return Err(anyhow!(
            "{} is not installed; use `modkit install {}`",
            module,
            module.namespace_id
        ));
    }
    if !manager.has_update(&module) {
        output::info(&format!("{} is up to date", module));
        return Ok(());
    }

    report(manager.enqueue_update(&module)?, &format!("update of {}", module));
    finish(&manager, args.now)
}

pub fn uninstall(args: ModuleArgs, config: &ModkitConfig) -> Result<()> {
    let manager = open_manager(config)?;
    let module = find_module(&manager, &args.namespace)?;

    if !manager.is_installed(&module) {
        output::info(&format!("{} is not installed", module));
        return Ok(());
    }

    let dependents: Vec<String> = manager
        .all_modules()
        .iter()
        .filter(|m| m.prerequisite_ids().contains(&module.namespace_id.as_str()))
        .filter(|m| manager.is_installed(m))
        .map(|m| m.namespace_id.clone())
        .collect();
    if !dependents.is_empty() {
        output::warn(&format!(
            "Installed modules depend on {}: {}",
            module.namespace_id,
            dependents.join(", ")
        ));
    }

    report(
        manager.enqueue_uninstall(&module)?,
        &format!("removal of {}", module),
    );
    finish(&manager, args.now)
}

fn describe(manager: &ModuleManager, request: &modkit_core::types::ChangeRequest) -> String {
    manager
        .all_modules()
        .iter()
        .find(|m| m.package_file_path == request.module_package_path)
        .map(|m| format!("{} of {}", request.flow, m))
        .unwrap_or_else(|| request.to_string())
}

fn report(outcome: AddOutcome, what: &str) {
    match outcome {
        AddOutcome::Added => output::success(&format!("Queued {}", what)),
        AddOutcome::Duplicate => output::info(&format!("The {} is already queued", what)),
    }
}

fn finish(manager: &ModuleManager, now: bool) -> Result<()> {
    if now {
        queue::run_all(manager)
    } else {
        output::info("Run `modkit queue run` to apply queued changes");
        Ok(())
    }
}
