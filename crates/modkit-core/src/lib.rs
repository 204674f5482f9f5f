//! # modkit-core
//!
//! Core library for modkit providing:
//! - The module data model (descriptors, installed records, change requests)
//! - On-disk document formats (catalog, manifest, installation descriptor)
//! - Hierarchical configuration loading
//! - Shared error types

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use utils::get_home_dir;
