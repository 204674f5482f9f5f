//! Module manager
//!
//! Single entry point for callers such as a status UI or the CLI. Queries
//! never fail; they fall back to "not installed" answers. Mutations go
//! through the persistent queue so every caller observes the same state.

use crate::catalog::ModuleCatalog;
use crate::context::OrchestrationContext;
use crate::discovery::{DescriptorReader, InstallDirScanner};
use crate::executor::{ChangeExecutor, ExecutionEnv, FileExecutor};
use crate::journal::{ChangeEvent, ChangeJournal, EventEnvelope};
use crate::manifest::FileManifest;
use crate::queue::{AddOutcome, ChangeQueue, PersistentQueue};
use crate::reload::{CommandReloader, LogReloader, ProgramReloader};
use crate::store::{FileStore, KeyValueStore};
use crate::symbols::SymbolFile;
use crate::tracker::InstallationTracker;
use anyhow::{Context, Result};
use modkit_core::types::{ChangeFlow, ChangeRequest, ModkitConfig, ModuleDescriptor, ModuleStatus};
use modkit_core::Error;
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ModuleManager {
    catalog: ModuleCatalog,
    tracker: InstallationTracker,
    queue: PersistentQueue,
    symbols: SymbolFile,
    executor: Box<dyn ChangeExecutor>,
    journal: Option<ChangeJournal>,
    journal_retention: usize,
    context: Cell<OrchestrationContext>,
}

impl ModuleManager {
    pub fn new(
        catalog: ModuleCatalog,
        tracker: InstallationTracker,
        queue: PersistentQueue,
        symbols: SymbolFile,
        executor: Box<dyn ChangeExecutor>,
    ) -> Self {
        Self {
            catalog,
            tracker,
            queue,
            symbols,
            executor,
            journal: None,
            journal_retention: 0,
            context: Cell::new(OrchestrationContext::new()),
        }
    }

    /// Record queue activity in `journal`, compacting to `retention` events
    /// (0 keeps everything)
    pub fn with_journal(mut self, journal: ChangeJournal, retention: usize) -> Self {
        self.journal = Some(journal);
        self.journal_retention = retention;
        self
    }

    /// Wire up the file-backed collaborators described by `config`
    pub fn from_config(config: &ModkitConfig) -> Result<Self> {
        let state_dir = config.state_dir_path()?;
        debug!("Using state directory {:?}", state_dir);

        let catalog = ModuleCatalog::load(&config.catalog_path(), &config.project_root)?;
        let manifest = FileManifest::load(&config.manifest_path())?;

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::in_dir(&state_dir));
        let tracker = InstallationTracker::new(
            Arc::clone(&store),
            Box::new(manifest),
            Box::new(DescriptorReader::new(&config.descriptor_file_name)),
            Box::new(InstallDirScanner::new(
                config.modules_root_path(),
                &config.descriptor_file_name,
                &config.namespace_root,
            )),
        );

        let reloader: Box<dyn ProgramReloader> = match &config.reload_command {
            Some(command) => Box::new(CommandReloader::new(command, &config.project_root)),
            None => Box::new(LogReloader),
        };
        let symbols = SymbolFile::new(&config.project_root, &config.symbol_file_name, reloader);

        Ok(Self::new(
            catalog,
            tracker,
            PersistentQueue::new(store),
            symbols,
            Box::new(FileExecutor::new(&config.descriptor_file_name)),
        )
        .with_journal(ChangeJournal::in_dir(&state_dir), config.journal_retention))
    }

    // Query surface

    /// Every known module, in catalog order
    pub fn all_modules(&self) -> &[Arc<ModuleDescriptor>] {
        self.catalog.modules()
    }

    pub fn module(&self, namespace_id: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.catalog.get(namespace_id)
    }

    pub fn require_module(&self, namespace_id: &str) -> modkit_core::Result<&Arc<ModuleDescriptor>> {
        self.catalog.require(namespace_id)
    }

    pub fn tracker(&self) -> &InstallationTracker {
        &self.tracker
    }

    pub fn symbols(&self) -> &SymbolFile {
        &self.symbols
    }

    pub fn journal(&self) -> Option<&ChangeJournal> {
        self.journal.as_ref()
    }

    pub fn is_installed(&self, module: &ModuleDescriptor) -> bool {
        self.tracker.is_installed(module)
    }

    pub fn has_update(&self, module: &ModuleDescriptor) -> bool {
        self.tracker.has_update(&self.context.get(), module)
    }

    pub fn installed_revision(&self, module: &ModuleDescriptor) -> i64 {
        self.tracker.installed_revision(&self.context.get(), module)
    }

    pub fn manifest_revision(&self, module: &ModuleDescriptor) -> i64 {
        self.tracker.manifest_revision(module)
    }

    /// Whether the package artifact is present on disk
    pub fn has_package(&self, module: &ModuleDescriptor) -> bool {
        module.package_file_path.exists()
    }

    pub fn has_define(&self, module: &ModuleDescriptor) -> bool {
        self.symbols.has_define(module)
    }

    pub fn status_icon(&self, module: &ModuleDescriptor) -> ModuleStatus {
        let installed = self.is_installed(module);
        ModuleStatus::classify(installed, installed && self.has_update(module))
    }

    /// Change at the head of the queue, if any
    pub fn current_process(&self) -> Option<ChangeRequest> {
        self.queue.current()
    }

    /// Module targeted by the change at the head of the queue
    pub fn current_module(&self) -> Option<Arc<ModuleDescriptor>> {
        let request = self.current_process()?;
        self.catalog
            .find_by_package(&request.module_package_path)
            .cloned()
    }

    pub fn queue_state(&self) -> Result<ChangeQueue> {
        self.queue.load()
    }

    // Mutation surface

    pub fn add_to_queue(&self, request: ChangeRequest) -> Result<AddOutcome> {
        let flow = request.flow;
        let namespace = self.namespace_for(&request);
        let outcome = self.queue.add(request)?;
        if outcome == AddOutcome::Added {
            self.journal_event(EventEnvelope::new(ChangeEvent::Queued, namespace, Some(flow)));
        }
        Ok(outcome)
    }

    /// Queue the install of `module`, preceded by its missing prerequisites
    /// unless `with_prerequisites` is false. Returns the requests added.
    pub fn enqueue_install(
        &self,
        module: &ModuleDescriptor,
        with_prerequisites: bool,
    ) -> Result<Vec<ChangeRequest>> {
        self.clear_if_drained()?;
        let mut targets = Vec::new();
        if with_prerequisites {
            targets.extend(self.tracker.missing_prerequisites(module));
        }

        let mut added = Vec::new();
        let requests = targets
            .iter()
            .map(|m| ChangeRequest::install(m.package_file_path.clone()))
            .chain(std::iter::once(ChangeRequest::install(
                module.package_file_path.clone(),
            )));
        for request in requests {
            if self.add_to_queue(request.clone())? == AddOutcome::Added {
                added.push(request);
            }
        }
        Ok(added)
    }

    pub fn enqueue_update(&self, module: &ModuleDescriptor) -> Result<AddOutcome> {
        self.clear_if_drained()?;
        self.add_to_queue(ChangeRequest::update(module.package_file_path.clone()))
    }

    pub fn enqueue_uninstall(&self, module: &ModuleDescriptor) -> Result<AddOutcome> {
        self.clear_if_drained()?;
        self.add_to_queue(ChangeRequest::uninstall(module.package_file_path.clone()))
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.queue.clear()?;
        self.journal_event(EventEnvelope::new(ChangeEvent::Cleared, "", None));
        Ok(())
    }

    /// Processed entries keep blocking equal requests until cleared, so a
    /// new batch starts from an empty queue once the last one has run
    fn clear_if_drained(&self) -> Result<()> {
        let queue = self.queue.load()?;
        if queue.has_next() || queue.entries.is_empty() {
            return Ok(());
        }
        debug!("Clearing {} processed changes", queue.entries.len());
        self.clear_queue()
    }

    /// Execute the next queued change; `false` once the queue is drained
    pub fn try_process_next(&self) -> Result<bool> {
        let processed = self
            .queue
            .try_process_next(|request| self.run_change(request))?;
        if !processed {
            self.compact_journal();
        }
        Ok(processed)
    }

    /// Re-run a change interrupted by a restart; returns whether one was re-run
    pub fn resume(&self) -> Result<bool> {
        self.queue.resume(|request| self.run_change(request))
    }

    /// Resume, then step until the queue is drained; returns the steps taken
    pub fn run_queue(&self) -> Result<usize> {
        let mut steps = usize::from(self.resume()?);
        while self.try_process_next()? {
            steps += 1;
        }
        Ok(steps)
    }

    fn run_change(&self, request: &ChangeRequest) -> Result<()> {
        let module = self
            .catalog
            .find_by_package(&request.module_package_path)
            .cloned()
            .ok_or_else(|| Error::unknown_package(request.module_package_path.display().to_string()))?;

        self.journal_event(EventEnvelope::new(
            ChangeEvent::Started,
            &module.namespace_id,
            Some(request.flow),
        ));

        self.context.set(OrchestrationContext::processing());
        let env = ExecutionEnv {
            tracker: &self.tracker,
            symbols: &self.symbols,
        };
        let result = self
            .executor
            .execute(&module, request.flow, &env)
            .with_context(|| format!("Failed to {} {}", request.flow, module.namespace_id));
        self.context.set(OrchestrationContext::new());

        match &result {
            Ok(()) => {
                let mut event =
                    EventEnvelope::new(ChangeEvent::Completed, &module.namespace_id, Some(request.flow));
                if request.flow != ChangeFlow::Uninstall {
                    event = event.with_revision(self.installed_revision(&module));
                }
                info!("Completed {} of {}", request.flow, module);
                self.journal_event(event);
            }
            Err(e) => {
                warn!("{:#}", e);
                self.journal_event(
                    EventEnvelope::new(ChangeEvent::Failed, &module.namespace_id, Some(request.flow))
                        .with_error(format!("{:#}", e)),
                );
            }
        }
        result
    }

    fn namespace_for(&self, request: &ChangeRequest) -> String {
        self.catalog
            .find_by_package(&request.module_package_path)
            .map(|m| m.namespace_id.clone())
            .unwrap_or_else(|| request.module_package_path.display().to_string())
    }

    fn journal_event(&self, event: EventEnvelope) {
        if let Some(journal) = &self.journal {
            journal.record(event);
        }
    }

    fn compact_journal(&self) {
        let (Some(journal), retention) = (&self.journal, self.journal_retention) else {
            return;
        };
        if retention == 0 {
            return;
        }
        match journal.compact(retention) {
            Ok(0) => {}
            Ok(removed) => debug!("Compacted journal: removed {} events", removed),
            Err(e) => warn!("Journal compaction failed: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{InstalledInfoReader, NamespaceScanner};
    use crate::store::MemoryStore;
    use modkit_core::types::InstalledModuleRecord;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct ListScanner(Arc<Mutex<Vec<String>>>);

    impl NamespaceScanner for ListScanner {
        fn scan(&self) -> Result<Vec<String>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct NoReader;

    impl InstalledInfoReader for NoReader {
        fn read(&self, _module: &ModuleDescriptor) -> Result<Option<InstalledModuleRecord>> {
            Ok(None)
        }
    }

    /// Executor that only flips the scanner list
    struct ListExecutor(ListScanner);

    impl ChangeExecutor for ListExecutor {
        fn install(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
            self.0 .0.lock().unwrap().push(module.namespace_id.clone());
            env.tracker.record_installed(&InstalledModuleRecord::new(
                &module.namespace_id,
                env.tracker.manifest_revision(module),
            ))?;
            env.tracker.refresh_namespace_cache();
            Ok(())
        }

        fn update(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
            self.install(module, env)
        }

        fn uninstall(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
            self.0 .0.lock().unwrap().retain(|ns| ns != &module.namespace_id);
            env.tracker.forget(&module.namespace_id)?;
            env.tracker.refresh_namespace_cache();
            Ok(())
        }
    }

    fn manager(temp_dir: &TempDir) -> ModuleManager {
        let mut builder = ModuleCatalog::builder();
        let core = builder.register(ModuleDescriptor::new(
            "Modkit.Modules.Core",
            "Core",
            "packages/core",
            "modules/core",
            "MODKIT_CORE",
        ));
        builder.register(
            ModuleDescriptor::new(
                "Modkit.Modules.Shop",
                "Shop",
                "packages/shop",
                "modules/shop",
                "MODKIT_SHOP",
            )
            .with_prerequisite(core),
        );

        let scanner = ListScanner::default();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let manifest = FileManifest::default()
            .with_entry("Modkit.Modules.Core", 2, "")
            .with_entry("Modkit.Modules.Shop", 5, "");
        let tracker = InstallationTracker::new(
            Arc::clone(&store),
            Box::new(manifest),
            Box::new(NoReader),
            Box::new(scanner.clone()),
        );
        let symbols = SymbolFile::new(temp_dir.path(), "modkit.rsp", Box::new(LogReloader));

        ModuleManager::new(
            builder.build(),
            tracker,
            PersistentQueue::new(store),
            symbols,
            Box::new(ListExecutor(scanner)),
        )
        .with_journal(ChangeJournal::in_dir(temp_dir.path()), 0)
    }

    #[test]
    fn test_enqueue_install_adds_prerequisites_first() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let shop = manager.module("Modkit.Modules.Shop").unwrap().clone();

        let added = manager.enqueue_install(&shop, true).unwrap();
        assert_eq!(
            added,
            vec![
                ChangeRequest::install("packages/core"),
                ChangeRequest::install("packages/shop")
            ]
        );
        assert!(manager.enqueue_install(&shop, true).unwrap().is_empty());
    }

    #[test]
    fn test_run_queue_installs_and_journals() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let shop = manager.module("Modkit.Modules.Shop").unwrap().clone();

        manager.enqueue_install(&shop, true).unwrap();
        assert_eq!(manager.run_queue().unwrap(), 2);

        assert!(manager.is_installed(&shop));
        assert_eq!(manager.installed_revision(&shop), 5);
        assert_eq!(manager.status_icon(&shop), ModuleStatus::Installed);
        assert!(!manager.context.get().processing);

        let history = manager
            .journal()
            .unwrap()
            .history("Modkit.Modules.Shop", None)
            .unwrap();
        let kinds: Vec<ChangeEvent> = history.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![ChangeEvent::Queued, ChangeEvent::Started, ChangeEvent::Completed]
        );
        assert_eq!(history[2].revision, Some(5));
    }

    #[test]
    fn test_unknown_package_fails_step() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        manager
            .add_to_queue(ChangeRequest::install("packages/ghost"))
            .unwrap();

        let err = manager.try_process_next().unwrap_err();
        assert!(err.to_string().contains("packages/ghost"));
        assert_eq!(manager.queue_state().unwrap().current_index, 0);
        assert!(!manager.queue_state().unwrap().dispatched);
    }

    #[test]
    fn test_failed_step_keeps_failed_change_current() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let core = manager.module("Modkit.Modules.Core").unwrap().clone();
        manager.enqueue_install(&core, false).unwrap();
        manager
            .add_to_queue(ChangeRequest::install("packages/ghost"))
            .unwrap();

        assert!(manager.try_process_next().unwrap());
        assert!(manager.try_process_next().is_err());
        assert_eq!(
            manager.current_process(),
            Some(ChangeRequest::install("packages/ghost"))
        );

        let journal = manager.journal().unwrap();
        let before = journal.history("Modkit.Modules.Core", None).unwrap().len();
        assert!(!manager.resume().unwrap());
        assert_eq!(
            journal.history("Modkit.Modules.Core", None).unwrap().len(),
            before
        );
    }

    #[test]
    fn test_new_batch_after_drain_starts_from_empty_queue() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let core = manager.module("Modkit.Modules.Core").unwrap().clone();
        manager.enqueue_install(&core, false).unwrap();
        manager.run_queue().unwrap();
        manager.enqueue_uninstall(&core).unwrap();
        manager.run_queue().unwrap();

        let added = manager.enqueue_install(&core, false).unwrap();
        assert_eq!(added, vec![ChangeRequest::install("packages/core")]);
        let state = manager.queue_state().unwrap();
        assert_eq!(state.entries, added);
        assert_eq!(state.current_index, 0);
        assert!(manager.run_queue().unwrap() > 0);
        assert!(manager.is_installed(&core));
    }

    #[test]
    fn test_clear_queue() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let core = manager.module("Modkit.Modules.Core").unwrap().clone();
        manager.enqueue_install(&core, false).unwrap();
        assert!(manager.current_process().is_some());
        assert_eq!(manager.current_module().unwrap().namespace_id, "Modkit.Modules.Core");

        manager.clear_queue().unwrap();
        assert!(manager.current_process().is_none());
        let recent = manager.journal().unwrap().recent(1).unwrap();
        assert_eq!(recent[0].event, ChangeEvent::Cleared);
    }
}
