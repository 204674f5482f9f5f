//! Compiler symbol file editing
//!
//! The symbol file is a plain-text response file holding one compiler
//! directive per line, for example:
//!
//! ```text
//! -define:MODKIT_EASING
//! -define:MODKIT_LOCALE;MODKIT_CURRENCY
//! -nowarn:0618
//! ```
//!
//! Exactly the defines of the enabled modules are present. Edits parse the
//! whole file, change the document and write it back in full, so every
//! rewrite also normalizes the file: one directive per line, no duplicates,
//! malformed tokens dropped, survivors kept in their original order.
//!
//! Adding a define that is already present or removing one that is absent
//! leaves the file untouched and does not trigger a reload.

use crate::reload::ProgramReloader;
use anyhow::{Context, Result};
use modkit_core::types::{is_valid_symbol, ModuleDescriptor};
use modkit_core::Error;
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const DEFINE_FLAGS: &[&str] = &["define", "d"];
const SYMBOL_SEPARATORS: &[char] = &[';', ','];

/// Search depth when looking for an existing symbol file
const MAX_SEARCH_DEPTH: usize = 4;

/// One directive of the symbol file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `-define:A;B`
    Define(Vec<String>),
    /// Any other `-flag[:value]` token, kept verbatim
    Other(String),
    /// `# ...` line
    Comment(String),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Define(symbols) => write!(f, "-define:{}", symbols.join(";")),
            Self::Other(token) => f.write_str(token),
            Self::Comment(text) => f.write_str(text),
        }
    }
}

/// Parsed symbol file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolDocument {
    directives: Vec<Directive>,
}

impl SymbolDocument {
    /// Tokenize `content`.
    ///
    /// Each line is split on whitespace. A token is a directive when it starts
    /// with `-` followed by a non-empty flag; everything else is dropped.
    /// Repeated directives and repeated define symbols keep their first
    /// occurrence only.
    pub fn parse(content: &str) -> Self {
        let mut directives = Vec::new();
        let mut seen_symbols: HashSet<String> = HashSet::new();
        let mut seen_tokens: HashSet<String> = HashSet::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                directives.push(Directive::Comment(line.to_string()));
                continue;
            }

            for token in line.split_whitespace() {
                match parse_token(token) {
                    Some(Directive::Define(symbols)) => {
                        let fresh: Vec<String> = symbols
                            .into_iter()
                            .filter(|s| seen_symbols.insert(s.clone()))
                            .collect();
                        if !fresh.is_empty() {
                            directives.push(Directive::Define(fresh));
                        }
                    }
                    Some(Directive::Other(token)) => {
                        if seen_tokens.insert(token.clone()) {
                            directives.push(Directive::Other(token));
                        }
                    }
                    Some(Directive::Comment(_)) => {}
                    None => debug!("Dropping malformed symbol file token {:?}", token),
                }
            }
        }

        Self { directives }
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Every defined symbol, in file order
    pub fn defines(&self) -> Vec<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::Define(symbols) => Some(symbols.iter().map(String::as_str)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn has_define(&self, symbol: &str) -> bool {
        self.directives.iter().any(|d| match d {
            Directive::Define(symbols) => symbols.iter().any(|s| s == symbol),
            _ => false,
        })
    }

    /// Append `-define:<symbol>` unless already defined; returns whether it changed
    pub fn add_define(&mut self, symbol: &str) -> bool {
        if self.has_define(symbol) {
            return false;
        }
        self.directives
            .push(Directive::Define(vec![symbol.to_string()]));
        true
    }

    /// Remove `symbol` from every define directive; returns whether it changed
    pub fn remove_define(&mut self, symbol: &str) -> bool {
        let mut changed = false;
        self.directives.retain_mut(|d| match d {
            Directive::Define(symbols) => {
                let before = symbols.len();
                symbols.retain(|s| s != symbol);
                changed |= symbols.len() != before;
                !symbols.is_empty()
            }
            _ => true,
        });
        changed
    }

    /// One directive per line with a trailing newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        for directive in &self.directives {
            out.push_str(&directive.to_string());
            out.push('\n');
        }
        out
    }
}

fn parse_token(token: &str) -> Option<Directive> {
    let body = token.strip_prefix('-')?;
    let (flag, value) = match body.split_once(':') {
        Some((flag, value)) => (flag, Some(value)),
        None => (body, None),
    };
    if flag.is_empty() {
        return None;
    }

    if DEFINE_FLAGS.contains(&flag.to_ascii_lowercase().as_str()) {
        let symbols: Vec<String> = value?
            .split(SYMBOL_SEPARATORS)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if symbols.is_empty() {
            return None;
        }
        return Some(Directive::Define(symbols));
    }

    if value.is_some_and(str::is_empty) {
        return None;
    }
    Some(Directive::Other(token.to_string()))
}

/// Editor for the project's compiler symbol file
pub struct SymbolFile {
    search_root: PathBuf,
    file_name: String,
    location: OnceLock<PathBuf>,
    reloader: Box<dyn ProgramReloader>,
}

impl SymbolFile {
    /// Editor that discovers `file_name` below `search_root` on first use
    pub fn new(
        search_root: impl Into<PathBuf>,
        file_name: impl Into<String>,
        reloader: Box<dyn ProgramReloader>,
    ) -> Self {
        Self {
            search_root: search_root.into(),
            file_name: file_name.into(),
            location: OnceLock::new(),
            reloader,
        }
    }

    /// Editor bound to an exact path
    pub fn at_path(path: impl Into<PathBuf>, reloader: Box<dyn ProgramReloader>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let search_root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let location = OnceLock::new();
        let _ = location.set(path);
        Self {
            search_root,
            file_name,
            location,
            reloader,
        }
    }

    /// Path of the symbol file, discovering or creating it on first call
    pub fn locate(&self) -> Result<&Path> {
        if let Some(path) = self.location.get() {
            return Ok(path.as_path());
        }

        let path = match self.discover() {
            Some(found) => {
                debug!("Found symbol file at {:?}", found);
                found
            }
            None => {
                let path = self.search_root.join(&self.file_name);
                info!("Creating symbol file at {:?}", path);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {:?}", parent))?;
                }
                std::fs::write(&path, "")
                    .with_context(|| format!("Failed to create symbol file {:?}", path))?;
                path
            }
        };

        Ok(self.location.get_or_init(|| path).as_path())
    }

    fn discover(&self) -> Option<PathBuf> {
        WalkDir::new(&self.search_root)
            .max_depth(MAX_SEARCH_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| e.ok())
            .find(|e| e.file_type().is_file() && e.file_name() == self.file_name.as_str())
            .map(|e| e.into_path())
    }

    /// Current document; a missing file reads as empty
    pub fn read(&self) -> Result<SymbolDocument> {
        let path = self.locate()?;
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read symbol file {:?}", path))
            }
        };
        Ok(SymbolDocument::parse(&content))
    }

    /// Defined symbols, in file order
    pub fn defines(&self) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .defines()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Whether the module's define is enabled; unreadable files count as not
    pub fn has_define(&self, module: &ModuleDescriptor) -> bool {
        match self.read() {
            Ok(document) => document.has_define(&module.compiler_define),
            Err(e) => {
                warn!("Could not read symbol file: {:#}", e);
                false
            }
        }
    }

    pub fn add_define(&self, module: &ModuleDescriptor) -> Result<bool> {
        self.add_defines(&[module])
    }

    /// Enable the defines of `modules`; returns whether the file changed
    pub fn add_defines(&self, modules: &[&ModuleDescriptor]) -> Result<bool> {
        for module in modules {
            if !is_valid_symbol(&module.compiler_define) {
                return Err(Error::invalid_symbol(&module.compiler_define).into());
            }
        }
        self.edit(|document| {
            modules
                .iter()
                .fold(false, |changed, m| document.add_define(&m.compiler_define) | changed)
        })
    }

    pub fn remove_define(&self, module: &ModuleDescriptor) -> Result<bool> {
        self.remove_defines(&[module])
    }

    /// Disable the defines of `modules`; returns whether the file changed
    pub fn remove_defines(&self, modules: &[&ModuleDescriptor]) -> Result<bool> {
        self.edit(|document| {
            modules
                .iter()
                .fold(false, |changed, m| document.remove_define(&m.compiler_define) | changed)
        })
    }

    fn edit(&self, apply: impl FnOnce(&mut SymbolDocument) -> bool) -> Result<bool> {
        let path = self.locate()?;
        let mut document = self.read()?;
        if !apply(&mut document) {
            debug!("Symbol file {:?} already up to date", path);
            return Ok(false);
        }

        write_atomic(path, &document.render())?;
        info!(
            "Rewrote symbol file {:?} ({} defines)",
            path,
            document.defines().len()
        );

        if let Err(e) = self.reloader.request_reload() {
            warn!("Program reload failed: {:#}", e);
        }
        Ok(true)
    }
}

/// Replace `path` via a temp file in the same directory, keeping the
/// permissions of the file being replaced
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {:?}", parent))?;
    temp.write_all(content.as_bytes())
        .context("Failed to write symbol file contents")?;
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .with_context(|| format!("Failed to copy permissions of {:?}", path))?;
    }
    temp.as_file()
        .sync_all()
        .context("Failed to sync symbol file")?;
    temp.persist(path)
        .with_context(|| format!("Failed to replace symbol file {:?}", path))?;
    Ok(())
}
