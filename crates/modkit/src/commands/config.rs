//! Config command

use anyhow::{Context, Result};
use modkit_core::types::ModkitConfig;

use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, config: &ModkitConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, config),
    }
}

fn show(args: ConfigShowArgs, config: &ModkitConfig) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        println!("{}", json);
        return Ok(());
    }

    let yaml = serde_yaml_ng::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);

    output::header("Resolved paths");
    output::kv("Catalog", &config.catalog_path().display().to_string());
    output::kv("Manifest", &config.manifest_path().display().to_string());
    output::kv("Modules root", &config.modules_root_path().display().to_string());
    output::kv("State", &config.state_dir_path()?.display().to_string());
    Ok(())
}
