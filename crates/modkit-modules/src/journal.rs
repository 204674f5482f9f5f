//! Change journal
//!
//! Append-only JSONL log of what happened to the change queue. The queue
//! itself only knows what is pending; the journal keeps the history so it can
//! be inspected after the fact (`modkit history`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use modkit_core::types::ChangeFlow;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default journal file name inside the state directory
pub const JOURNAL_FILE_NAME: &str = "journal.jsonl";

/// Lifecycle event of one queued change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEvent {
    Queued,
    Started,
    Completed,
    Failed,
    Cleared,
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cleared => "cleared",
        };
        f.write_str(label)
    }
}

/// Event metadata envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID (UUID v4)
    pub event_id: String,

    /// Event timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    pub event: ChangeEvent,

    /// Module namespace, empty for queue-wide events
    #[serde(default)]
    pub namespace: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flow: Option<ChangeFlow>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
}

impl EventEnvelope {
    pub fn new(event: ChangeEvent, namespace: impl Into<String>, flow: Option<ChangeFlow>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
            namespace: namespace.into(),
            flow,
            revision: None,
            error_message: None,
        }
    }

    pub fn with_revision(mut self, revision: i64) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

pub struct ChangeJournal {
    path: PathBuf,
}

impl ChangeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal at `<state_dir>/journal.jsonl`
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(JOURNAL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("jsonl.lock")
    }

    /// Exclusive lock shared by appends and compaction, released on drop.
    ///
    /// Compaction replaces the journal file, so the lock lives on a sidecar
    /// file whose inode never changes.
    fn lock(&self) -> Result<fs::File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create journal parent directory")?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .context("Failed to open journal lock file")?;
        lock_file
            .lock_exclusive()
            .context("Failed to acquire exclusive lock on journal")?;
        Ok(lock_file)
    }

    /// Append event to the journal (file-locked)
    pub fn append(&self, event: &EventEnvelope) -> Result<()> {
        let _lock = self.lock()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open journal file")?;

        let json_line = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(file, "{}", json_line).context("Failed to write event to journal")?;
        file.sync_all().context("Failed to sync journal file")?;
        Ok(())
    }

    /// Append, logging instead of failing
    pub fn record(&self, event: EventEnvelope) {
        if let Err(e) = self.append(&event) {
            warn!("Failed to journal {} event: {:#}", event.event, e);
        }
    }

    fn read_all(&self) -> Result<Vec<EventEnvelope>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path).context("Failed to open journal file")?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read line from journal")?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventEnvelope>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping unreadable journal line {}: {}", number + 1, e),
            }
        }
        Ok(events)
    }

    /// Events for one module, oldest first, at most the newest `limit`
    pub fn history(&self, namespace: &str, limit: Option<usize>) -> Result<Vec<EventEnvelope>> {
        let events: Vec<EventEnvelope> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.namespace == namespace)
            .collect();
        Ok(tail(events, limit))
    }

    /// Newest `limit` events of any module, oldest first
    pub fn recent(&self, limit: usize) -> Result<Vec<EventEnvelope>> {
        Ok(tail(self.read_all()?, Some(limit)))
    }

    /// Keep only the newest `keep` events; returns how many were dropped
    pub fn compact(&self, keep: usize) -> Result<usize> {
        let _lock = self.lock()?;
        let events = self.read_all()?;
        if events.len() <= keep {
            return Ok(0);
        }
        let removed = events.len() - keep;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create temp journal file")?;
        for event in &events[removed..] {
            let json_line = serde_json::to_string(event).context("Failed to serialize event")?;
            writeln!(temp, "{}", json_line).context("Failed to write to temp journal")?;
        }
        temp.as_file()
            .sync_all()
            .context("Failed to sync temp journal")?;
        temp.persist(&self.path)
            .context("Failed to replace journal with compacted version")?;

        Ok(removed)
    }
}

fn tail(mut events: Vec<EventEnvelope>, limit: Option<usize>) -> Vec<EventEnvelope> {
    if let Some(limit) = limit {
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
    }
    events
}
