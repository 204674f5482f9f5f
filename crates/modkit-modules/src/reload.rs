//! Program reload trigger
//!
//! After the compiler symbol file changes, the host program has to be rebuilt
//! or reloaded before newly enabled module code takes effect.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

pub trait ProgramReloader {
    fn request_reload(&self) -> Result<()>;
}

/// Only records that a reload is due; the host picks it up on its own
#[derive(Debug, Default)]
pub struct LogReloader;

impl ProgramReloader for LogReloader {
    fn request_reload(&self) -> Result<()> {
        info!("Compiler symbols changed; reload the host program to apply them");
        Ok(())
    }
}

/// Runs a shell command (e.g. a rebuild) in the project root
#[derive(Debug, Clone)]
pub struct CommandReloader {
    command: String,
    working_dir: PathBuf,
}

impl CommandReloader {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }

    fn expression(&self) -> duct::Expression {
        if cfg!(windows) {
            duct::cmd("cmd", ["/C", self.command.as_str()])
        } else {
            duct::cmd("sh", ["-c", self.command.as_str()])
        }
    }
}

impl ProgramReloader for CommandReloader {
    fn request_reload(&self) -> Result<()> {
        info!("Running reload command: {}", self.command);
        let output = self
            .expression()
            .dir(&self.working_dir)
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .with_context(|| format!("Failed to start reload command `{}`", self.command))?;

        let log = String::from_utf8_lossy(&output.stdout);
        for line in log.lines() {
            debug!("reload: {}", line);
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(anyhow!(
                "Reload command `{}` exited with {}",
                self.command,
                output.status
            ))
        }
    }
}
