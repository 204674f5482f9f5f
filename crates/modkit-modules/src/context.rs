//! Per-invocation orchestration state

/// State shared by the components taking part in one driver invocation
///
/// Created by the module manager when a driver starts working the queue and
/// dropped with it; nothing here is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestrationContext {
    /// A queued change is being executed right now. Revision queries then
    /// report the revision being installed instead of the one on disk.
    pub processing: bool,
}

impl OrchestrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processing() -> Self {
        Self { processing: true }
    }
}
