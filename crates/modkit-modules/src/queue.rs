//! Persistent change queue
//!
//! Install, update and uninstall requests are worked off one at a time by a
//! cooperative driver. The queue lives in the key/value store and is read
//! back in full on every call, so a process restart between two steps loses
//! nothing: the next driver picks the queue up where the last one left it.
//!
//! # States
//!
//! - **Idle**: no entries, or every entry has been stepped past.
//! - **Active**: `current_index < entries.len()`.
//!
//! `current_index` never decreases; only [`PersistentQueue::clear`] resets
//! it. Each entry is handed to the handler once by
//! [`PersistentQueue::try_process_next`] and marked dispatched; the next call
//! steps past it. A dispatched entry stays current until then, which is what
//! [`PersistentQueue::resume`] re-runs after a restart. An entry whose
//! handler failed stays current but undispatched, so the next step retries it.

use crate::store::{KeyValueStore, KeyValueStoreExt};
use anyhow::{Context, Result};
use modkit_core::types::ChangeRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Store key holding the serialized queue
pub const QUEUE_KEY: &str = "change_queue";

/// Serialized form of the queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeQueue {
    pub entries: Vec<ChangeRequest>,
    pub current_index: usize,
    /// The current entry has been handed to a handler
    #[serde(default)]
    pub dispatched: bool,
}

impl ChangeQueue {
    pub fn has_next(&self) -> bool {
        self.entries.len() > self.current_index
    }

    pub fn current(&self) -> Option<&ChangeRequest> {
        self.entries.get(self.current_index)
    }

    pub fn contains(&self, request: &ChangeRequest) -> bool {
        self.entries.iter().any(|entry| entry == request)
    }
}

/// What a call to [`PersistentQueue::add`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
}

/// Change queue persisted in a [`KeyValueStore`]
pub struct PersistentQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl PersistentQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: QUEUE_KEY.to_string(),
        }
    }

    /// Read the persisted queue; an absent queue is empty
    pub fn load(&self) -> Result<ChangeQueue> {
        self.store
            .get_or(&self.key, ChangeQueue::default())
            .context("Failed to read change queue")
    }

    fn save(&self, queue: &ChangeQueue) -> Result<()> {
        self.store
            .set(&self.key, queue)
            .context("Failed to persist change queue")
    }

    /// Current entry, or `None` when idle or unreadable
    pub fn current(&self) -> Option<ChangeRequest> {
        match self.load() {
            Ok(queue) => queue.current().cloned(),
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.load().map(|q| q.has_next()).unwrap_or(false)
    }

    /// Append `request` unless the same package and flow is already queued.
    ///
    /// Processed entries still count as queued until [`Self::clear`].
    pub fn add(&self, request: ChangeRequest) -> Result<AddOutcome> {
        let mut queue = self.load()?;

        if queue.contains(&request) {
            debug!("Already queued: {}", request);
            return Ok(AddOutcome::Duplicate);
        }

        info!("Queued {}", request);
        queue.entries.push(request);
        self.save(&queue)?;
        Ok(AddOutcome::Added)
    }

    /// Drop every entry and reset the index
    pub fn clear(&self) -> Result<()> {
        info!("Clearing change queue");
        self.save(&ChangeQueue::default())
    }

    /// Step to the next entry and hand it to `handler`.
    ///
    /// Returns `Ok(false)` once the queue is drained. The advanced index is
    /// persisted before `handler` runs. When `handler` fails the failed entry
    /// is left current and undispatched and the error is returned, so the
    /// next step retries it and [`Self::resume`] has nothing to re-run.
    pub fn try_process_next<F>(&self, mut handler: F) -> Result<bool>
    where
        F: FnMut(&ChangeRequest) -> Result<()>,
    {
        let snapshot = self.load()?;
        let mut queue = snapshot.clone();

        if queue.dispatched {
            queue.current_index += 1;
            queue.dispatched = false;
        }

        let Some(request) = queue.current().cloned() else {
            if queue != snapshot {
                self.save(&queue)?;
            }
            debug!("Change queue drained");
            return Ok(false);
        };

        queue.dispatched = true;
        self.save(&queue)?;
        info!(
            "Processing {} ({}/{})",
            request,
            queue.current_index + 1,
            queue.entries.len()
        );

        if let Err(e) = handler(&request) {
            warn!("Change {} failed, leaving it queued", request);
            queue.dispatched = false;
            self.save(&queue)
                .context("Failed to persist change queue after a failed step")?;
            return Err(e);
        }
        Ok(true)
    }

    /// Re-run the handler for an entry that was dispatched but not yet
    /// stepped past, e.g. because the process restarted mid-change.
    ///
    /// Returns whether anything was re-run.
    pub fn resume<F>(&self, mut handler: F) -> Result<bool>
    where
        F: FnMut(&ChangeRequest) -> Result<()>,
    {
        let queue = self.load()?;
        match queue.current() {
            Some(request) if queue.dispatched => {
                info!("Resuming {}", request);
                handler(request)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::anyhow;

    fn queue() -> (PersistentQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PersistentQueue::new(store.clone()), store)
    }

    #[test]
    fn test_fresh_queue_is_idle() {
        let (queue, _store) = queue();
        assert!(!queue.has_next());
        assert!(queue.current().is_none());
        assert!(!queue.try_process_next(|_| Ok(())).unwrap());
    }

    #[test]
    fn test_add_dedups() {
        let (queue, _store) = queue();
        let request = ChangeRequest::install("packages/easing.tar.gz");

        assert_eq!(queue.add(request.clone()).unwrap(), AddOutcome::Added);
        assert_eq!(queue.add(request.clone()).unwrap(), AddOutcome::Duplicate);
        assert_eq!(
            queue
                .add(ChangeRequest::update("packages/easing.tar.gz"))
                .unwrap(),
            AddOutcome::Added
        );
        assert_eq!(queue.load().unwrap().entries.len(), 2);
    }

    #[test]
    fn test_steps_in_order_then_drains() {
        let (queue, _store) = queue();
        queue.add(ChangeRequest::install("a")).unwrap();
        queue.add(ChangeRequest::install("b")).unwrap();

        let mut seen = Vec::new();
        while queue
            .try_process_next(|r| {
                seen.push(r.module_package_path.clone());
                Ok(())
            })
            .unwrap()
        {}

        assert_eq!(seen, vec![std::path::PathBuf::from("a"), "b".into()]);
        let state = queue.load().unwrap();
        assert_eq!(state.current_index, 2);
        assert!(!state.has_next());
        assert!(!queue.try_process_next(|_| Ok(())).unwrap());
        assert_eq!(queue.load().unwrap().current_index, 2);
    }

    #[test]
    fn test_failed_step_leaves_failed_entry_current() {
        let (queue, _store) = queue();
        queue.add(ChangeRequest::install("a")).unwrap();
        queue.add(ChangeRequest::install("b")).unwrap();
        queue.try_process_next(|_| Ok(())).unwrap();
        let before = queue.load().unwrap();

        assert_eq!(before.current_index, 0);
        assert!(before.dispatched);

        let err = queue
            .try_process_next(|_| Err(anyhow!("disk full")))
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        let after = queue.load().unwrap();
        assert_eq!(after.current_index, 1);
        assert!(!after.dispatched);
        assert_eq!(queue.current(), Some(ChangeRequest::install("b")));
        assert!(!queue.resume(|_| panic!("nothing to resume")).unwrap());

        let mut retried = None;
        assert!(queue
            .try_process_next(|r| {
                retried = Some(r.clone());
                Ok(())
            })
            .unwrap());
        assert_eq!(retried, Some(ChangeRequest::install("b")));
    }

    #[test]
    fn test_resume_reruns_dispatched_entry() {
        let (queue, store) = queue();
        queue.add(ChangeRequest::install("a")).unwrap();
        assert!(!queue.resume(|_| Ok(())).unwrap());

        queue.try_process_next(|_| Ok(())).unwrap();

        let restarted = PersistentQueue::new(store);
        let mut rerun = Vec::new();
        assert!(restarted
            .resume(|r| {
                rerun.push(r.clone());
                Ok(())
            })
            .unwrap());
        assert_eq!(rerun, vec![ChangeRequest::install("a")]);
    }

    #[test]
    fn test_add_after_drain_appends() {
        let (queue, _store) = queue();
        let request = ChangeRequest::install("a");
        queue.add(request.clone()).unwrap();
        while queue.try_process_next(|_| Ok(())).unwrap() {}

        assert_eq!(queue.add(request.clone()).unwrap(), AddOutcome::Duplicate);
        assert_eq!(
            queue.add(ChangeRequest::uninstall("a")).unwrap(),
            AddOutcome::Added
        );
        let state = queue.load().unwrap();
        assert_eq!(state.current_index, 1);
        assert_eq!(queue.current(), Some(ChangeRequest::uninstall("a")));

        let mut ran = None;
        assert!(queue
            .try_process_next(|r| {
                ran = Some(r.clone());
                Ok(())
            })
            .unwrap());
        assert_eq!(ran, Some(ChangeRequest::uninstall("a")));
    }

    #[test]
    fn test_clear_resets() {
        let (queue, _store) = queue();
        queue.add(ChangeRequest::install("a")).unwrap();
        queue.try_process_next(|_| Ok(())).unwrap();
        queue.clear().unwrap();
        assert_eq!(queue.load().unwrap(), ChangeQueue::default());
    }

    #[test]
    fn test_malformed_queue_reads_as_error() {
        let (queue, store) = queue();
        store
            .set_raw(QUEUE_KEY, serde_json::json!({"entries": "nope"}))
            .unwrap();
        assert!(queue.load().is_err());
        assert!(queue.current().is_none());
        assert!(!queue.has_next());
    }
}
