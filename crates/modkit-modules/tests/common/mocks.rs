//! Mock collaborators

#![allow(dead_code)]

use anyhow::Result;
use modkit_modules::ProgramReloader;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reloader that counts how often a reload was requested
#[derive(Clone, Default)]
pub struct CountingReloader {
    calls: Arc<AtomicUsize>,
}

impl CountingReloader {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProgramReloader for CountingReloader {
    fn request_reload(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reloader that always fails
pub struct FailingReloader;

impl ProgramReloader for FailingReloader {
    fn request_reload(&self) -> Result<()> {
        anyhow::bail!("host program is not running")
    }
}
