//! Type definitions shared across modkit crates

mod change_types;
mod config_types;
mod file_types;
mod module_types;

pub use change_types::*;
pub use config_types::*;
pub use file_types::*;
pub use module_types::*;
