//! Queue commands

use anyhow::{Context, Result};
use modkit_core::types::ModkitConfig;
use modkit_modules::ModuleManager;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::cli::{QueueCommands, QueueShowArgs};
use crate::commands::open_manager;
use crate::output;

pub fn run(cmd: QueueCommands, config: &ModkitConfig) -> Result<()> {
    let manager = open_manager(config)?;
    match cmd {
        QueueCommands::Show(args) => show(&manager, args),
        QueueCommands::Clear => clear(&manager),
        QueueCommands::Step => step(&manager),
        QueueCommands::Run => run_all(&manager),
    }
}

#[derive(Tabled, Serialize)]
struct QueueRow {
    #[tabled(rename = "#")]
    position: usize,
    flow: String,
    module: String,
    package: String,
    state: &'static str,
}

fn show(manager: &ModuleManager, args: QueueShowArgs) -> Result<()> {
    let queue = manager.queue_state()?;

    let rows: Vec<QueueRow> = queue
        .entries
        .iter()
        .enumerate()
        .filter(|(i, _)| args.all || *i >= queue.current_index)
        .map(|(i, request)| {
            let state = if i < queue.current_index {
                "done"
            } else if i == queue.current_index && queue.dispatched {
                "in progress"
            } else {
                "pending"
            };
            let module = manager
                .all_modules()
                .iter()
                .find(|m| m.package_file_path == request.module_package_path)
                .map(|m| m.namespace_id.clone())
                .unwrap_or_else(|| "?".to_string());
            QueueRow {
                position: i + 1,
                flow: request.flow.to_string(),
                module,
                package: request.module_package_path.display().to_string(),
                state,
            }
        })
        .collect();

    if args.json {
        let json = serde_json::to_string_pretty(&rows).context("Failed to serialize queue")?;
        println!("{}", json);
    } else if rows.is_empty() {
        output::info("Change queue is empty");
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

fn clear(manager: &ModuleManager) -> Result<()> {
    manager.clear_queue()?;
    output::success("Cleared change queue");
    Ok(())
}

fn step(manager: &ModuleManager) -> Result<()> {
    if manager.try_process_next()? {
        if let Some(request) = manager.current_process() {
            output::success(&format!("Applied {}", request));
        }
    } else {
        output::info("Nothing left to process");
    }
    Ok(())
}

/// Resume an interrupted change, then drain the queue
pub fn run_all(manager: &ModuleManager) -> Result<()> {
    let steps = manager.run_queue()?;
    if steps == 0 {
        output::info("Nothing left to process");
    } else {
        output::success(&format!("Applied {} queued change(s)", steps));
    }
    Ok(())
}
