//! Terminal output utilities

use console::{style, StyledObject};
use modkit_core::types::ModuleStatus;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Status icon and label
pub fn status(status: ModuleStatus) -> StyledObject<String> {
    let label = format!("{} {}", status.icon(), status);
    match status {
        ModuleStatus::NotInstalled => style(label).dim(),
        ModuleStatus::UpdateAvailable => style(label).yellow(),
        ModuleStatus::Installed => style(label).green(),
    }
}

/// Revision for display, `-` for the unknown sentinel
pub fn revision(revision: i64) -> String {
    if revision < 0 {
        "-".to_string()
    } else {
        revision.to_string()
    }
}
