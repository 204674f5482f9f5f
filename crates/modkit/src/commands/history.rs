//! History command

use anyhow::{Context, Result};
use modkit_core::types::ModkitConfig;
use tabled::{Table, Tabled};

use crate::cli::HistoryArgs;
use crate::commands::open_manager;
use crate::output;

#[derive(Tabled)]
struct EventRow {
    time: String,
    event: String,
    module: String,
    flow: String,
    detail: String,
}

pub fn run(args: HistoryArgs, config: &ModkitConfig) -> Result<()> {
    let manager = open_manager(config)?;
    let Some(journal) = manager.journal() else {
        output::warn("Change journal is disabled");
        return Ok(());
    };

    let events = match &args.namespace {
        Some(namespace) => journal.history(namespace, Some(args.limit))?,
        None => journal.recent(args.limit)?,
    };

    if args.json {
        let json = serde_json::to_string_pretty(&events).context("Failed to serialize events")?;
        println!("{}", json);
        return Ok(());
    }
    if events.is_empty() {
        output::info("No changes recorded");
        return Ok(());
    }

    let rows: Vec<EventRow> = events
        .into_iter()
        .map(|e| EventRow {
            time: e.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            event: e.event.to_string(),
            module: e.namespace,
            flow: e.flow.map(|f| f.to_string()).unwrap_or_default(),
            detail: match (e.revision, e.error_message) {
                (_, Some(message)) => message,
                (Some(revision), None) => format!("revision {}", revision),
                (None, None) => String::new(),
            },
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
