//! Defines command

use anyhow::{Context, Result};
use modkit_core::types::ModkitConfig;

use crate::cli::DefinesArgs;
use crate::commands::open_manager;
use crate::output;

pub fn run(args: DefinesArgs, config: &ModkitConfig) -> Result<()> {
    let manager = open_manager(config)?;
    let symbols = manager.symbols();
    let defines = symbols.defines()?;

    if args.json {
        let json = serde_json::to_string_pretty(&defines).context("Failed to serialize defines")?;
        println!("{}", json);
        return Ok(());
    }

    output::kv("Symbol file", &symbols.locate()?.display().to_string());
    if defines.is_empty() {
        output::info("No defines enabled");
    }
    for define in &defines {
        let owner = manager
            .all_modules()
            .iter()
            .find(|m| &m.compiler_define == define)
            .map(|m| m.namespace_id.as_str())
            .unwrap_or("not managed");
        println!("  {} {}", define, console::style(format!("({})", owner)).dim());
    }
    Ok(())
}
