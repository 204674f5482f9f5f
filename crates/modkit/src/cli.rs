//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// modkit - install, update and uninstall optional feature modules
#[derive(Parser, Debug)]
#[command(name = "modkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a config file (replaces ~/.modkit/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every known module with its status
    List(ListArgs),

    /// Show the status of one module
    Status(StatusArgs),

    /// Queue the install of a module
    Install(InstallArgs),

    /// Queue the update of an installed module
    Update(ModuleArgs),

    /// Queue the removal of a module
    Uninstall(ModuleArgs),

    /// Inspect and work the change queue
    #[command(subcommand)]
    Queue(QueueCommands),

    /// Show the defines enabled in the compiler symbol file
    Defines(DefinesArgs),

    /// Show the change journal
    History(HistoryArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show installed modules
    #[arg(long)]
    pub installed: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Module namespace
    pub namespace: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Module namespace
    pub namespace: String,

    /// Do not queue missing prerequisites
    #[arg(long)]
    pub no_deps: bool,

    /// Work the queue right away
    #[arg(long)]
    pub now: bool,
}

#[derive(Args, Debug)]
pub struct ModuleArgs {
    /// Module namespace
    pub namespace: String,

    /// Work the queue right away
    #[arg(long)]
    pub now: bool,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Show queued changes
    Show(QueueShowArgs),

    /// Drop every queued change
    Clear,

    /// Execute the next queued change
    Step,

    /// Resume an interrupted change, then execute everything queued
    Run,
}

#[derive(Args, Debug)]
pub struct QueueShowArgs {
    /// Include changes already processed
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DefinesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only events for this module namespace
    pub namespace: Option<String>,

    /// Maximum number of events
    #[arg(short = 'n', long, default_value_t = 25)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
