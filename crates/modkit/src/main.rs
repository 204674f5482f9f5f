//! modkit CLI - optional feature module lifecycle
//!
//! This is the main entry point for the modkit command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List(args) => commands::list::run(args, &config),
        Commands::Status(args) => commands::status::run(args, &config),
        Commands::Install(args) => commands::change::install(args, &config),
        Commands::Update(args) => commands::change::update(args, &config),
        Commands::Uninstall(args) => commands::change::uninstall(args, &config),
        Commands::Queue(cmd) => commands::queue::run(cmd, &config),
        Commands::Defines(args) => commands::defines::run(args, &config),
        Commands::History(args) => commands::history::run(args, &config),
        Commands::Config(cmd) => commands::config::run(cmd, &config),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
