//! Change executors
//!
//! An executor performs the file work of one queued change and then brings
//! the installation records and the compiler symbol file in line with it.
//! Every step overwrites rather than appends, so running the same change
//! twice (after a restart mid-change) converges on the same result.
//!
//! Packages are unpacked into a hidden staging directory next to the install
//! directory and swapped in only once complete. A broken package leaves the
//! previous install, its record and its define untouched.

use crate::discovery::write_descriptor;
use crate::symbols::SymbolFile;
use crate::tracker::InstallationTracker;
use anyhow::{Context, Result};
use chrono::Utc;
use flate2::read::GzDecoder;
use modkit_core::types::{
    ChangeFlow, InstallDescriptor, InstalledModuleRecord, ModuleDescriptor, UNKNOWN_REVISION,
};
use std::fs;
use std::path::Path;
use tar::Archive;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Package for {namespace} not found at {path}")]
    MissingPackage { namespace: String, path: String },

    #[error("Cannot install {namespace}: prerequisites not installed: {missing}")]
    MissingPrerequisites { namespace: String, missing: String },
}

/// Collaborators an executor updates after the file work
pub struct ExecutionEnv<'a> {
    pub tracker: &'a InstallationTracker,
    pub symbols: &'a SymbolFile,
}

pub trait ChangeExecutor {
    fn install(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()>;

    fn update(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()>;

    fn uninstall(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()>;

    fn execute(
        &self,
        module: &ModuleDescriptor,
        flow: ChangeFlow,
        env: &ExecutionEnv<'_>,
    ) -> Result<()> {
        match flow {
            ChangeFlow::Install => self.install(module, env),
            ChangeFlow::Update => self.update(module, env),
            ChangeFlow::Uninstall => self.uninstall(module, env),
        }
    }
}

/// Unpacks package artifacts into install directories
pub struct FileExecutor {
    descriptor_file_name: String,
}

impl FileExecutor {
    pub fn new(descriptor_file_name: impl Into<String>) -> Self {
        Self {
            descriptor_file_name: descriptor_file_name.into(),
        }
    }

    fn check_prerequisites(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
        let missing: Vec<&str> = module
            .prerequisites
            .iter()
            .filter(|p| !env.tracker.is_installed(p))
            .map(|p| p.namespace_id.as_str())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(ExecutorError::MissingPrerequisites {
            namespace: module.namespace_id.clone(),
            missing: missing.join(", "),
        }
        .into())
    }

    /// Replace the install directory with the package contents, then record it
    fn deploy(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
        let package = &module.package_file_path;
        if !package.exists() {
            return Err(ExecutorError::MissingPackage {
                namespace: module.namespace_id.clone(),
                path: package.display().to_string(),
            }
            .into());
        }

        let staging = staging_dir(&module.install_path)?;
        unpack_package(package, staging.path())?;

        let entry = env.tracker.manifest_entry(module);
        let revision = match entry.as_ref().map(|e| e.revision) {
            Some(revision) if revision != UNKNOWN_REVISION => revision,
            _ => {
                warn!(
                    "{} has no manifest revision, recording revision 0",
                    module.namespace_id
                );
                0
            }
        };
        let descriptor = InstallDescriptor {
            namespace: module.namespace_id.clone(),
            revision,
            author: entry.map(|e| e.author).unwrap_or_default(),
            installed_at: Some(Utc::now()),
        };
        write_descriptor(
            &staging.path().join(&self.descriptor_file_name),
            &descriptor,
        )?;
        swap_in(staging, &module.install_path)?;

        env.tracker
            .record_installed(&InstalledModuleRecord::new(&module.namespace_id, revision))?;
        env.tracker.refresh_namespace_cache();
        env.symbols.add_define(module)?;

        info!("Deployed {} at revision {}", module, revision);
        Ok(())
    }
}

impl ChangeExecutor for FileExecutor {
    fn install(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
        self.check_prerequisites(module, env)?;
        self.deploy(module, env)
    }

    fn update(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
        if !env.tracker.is_installed(module) {
            debug!("Updating {} which is not installed yet", module.namespace_id);
        }
        self.deploy(module, env)
    }

    fn uninstall(&self, module: &ModuleDescriptor, env: &ExecutionEnv<'_>) -> Result<()> {
        remove_dir_if_exists(&module.install_path)?;
        env.tracker.forget(&module.namespace_id)?;
        env.tracker.refresh_namespace_cache();
        env.symbols.remove_define(module)?;

        info!("Removed {}", module);
        Ok(())
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Empty hidden directory beside `install_path`, on the same filesystem
fn staging_dir(install_path: &Path) -> Result<TempDir> {
    let parent = parent_dir(install_path);
    fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    tempfile::Builder::new()
        .prefix(".modkit-stage-")
        .tempdir_in(parent)
        .with_context(|| format!("Failed to create staging directory in {:?}", parent))
}

/// Replace `install_path` with the staged tree.
///
/// The staged tree takes the permissions of the old install (or of the
/// parent directory for a fresh one). The old install is moved aside first
/// and put back if the staged tree cannot be moved in.
fn swap_in(staging: TempDir, install_path: &Path) -> Result<()> {
    if let Ok(metadata) =
        fs::metadata(install_path).or_else(|_| fs::metadata(parent_dir(install_path)))
    {
        fs::set_permissions(staging.path(), metadata.permissions())
            .with_context(|| format!("Failed to set permissions on {:?}", staging.path()))?;
    }

    let backup = staging_dir(install_path)?;
    let previous = backup.path().join("previous");
    let had_previous = match fs::rename(install_path, &previous) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to move aside {:?}", install_path))
        }
    };

    if let Err(e) = fs::rename(staging.path(), install_path) {
        if had_previous {
            if let Err(restore) = fs::rename(&previous, install_path) {
                warn!("Failed to restore {:?}: {}", install_path, restore);
            }
        }
        return Err(e).with_context(|| format!("Failed to move package into {:?}", install_path));
    }

    // the staged tree is `install_path` now; dropping `backup` removes the old install
    let _ = staging.keep();
    drop(backup);
    Ok(())
}

fn is_tarball(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Copy or extract `package` into `destination`
fn unpack_package(package: &Path, destination: &Path) -> Result<()> {
    if package.is_dir() {
        debug!("Copying package directory {:?}", package);
        return copy_dir(package, destination);
    }

    if is_tarball(package) {
        debug!("Extracting package {:?}", package);
        let file = fs::File::open(package)
            .with_context(|| format!("Failed to open package {:?}", package))?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive.set_overwrite(true);
        return archive
            .unpack(destination)
            .with_context(|| format!("Failed to extract package {:?}", package));
    }

    let file_name = package
        .file_name()
        .with_context(|| format!("Package path {:?} has no file name", package))?;
    fs::copy(package, destination.join(file_name))
        .with_context(|| format!("Failed to copy package {:?}", package))?;
    Ok(())
}

fn copy_dir(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", source))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("Walked outside the package directory")?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {:?}", target))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {:?}", entry.path()))?;
        }
    }
    Ok(())
}
