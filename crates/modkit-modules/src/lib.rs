//! Module lifecycle orchestration for modkit
//!
//! This crate handles:
//! - Module catalog registration and prerequisite resolution
//! - Installation state tracking (installed vs. available revision)
//! - The persistent, restart-safe change queue
//! - Compiler symbol file editing
//! - Install/update/uninstall executors
//! - The change journal

pub mod catalog;
pub mod context;
pub mod discovery;
pub mod executor;
pub mod journal;
pub mod manager;
pub mod manifest;
pub mod queue;
pub mod reload;
pub mod store;
pub mod symbols;
pub mod tracker;

pub use catalog::{CatalogBuilder, ModuleCatalog};
pub use context::OrchestrationContext;
pub use discovery::{DescriptorReader, InstallDirScanner, InstalledInfoReader, NamespaceScanner};
pub use executor::{ChangeExecutor, ExecutionEnv, ExecutorError, FileExecutor};
pub use journal::{ChangeEvent, ChangeJournal, EventEnvelope};
pub use manager::ModuleManager;
pub use manifest::{FileManifest, ManifestProvider};
pub use queue::{AddOutcome, ChangeQueue, PersistentQueue};
pub use reload::{CommandReloader, LogReloader, ProgramReloader};
pub use store::{FileStore, KeyValueStore, KeyValueStoreExt, MemoryStore};
pub use symbols::{Directive, SymbolDocument, SymbolFile};
pub use tracker::InstallationTracker;
