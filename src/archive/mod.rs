// src/archive/mod.rs

//! Archive inspection
//!
//! Derives the identifying tokens of an EESSI tarball from two independent
//! sources without unpacking it:
//!
//! - the file name, `eessi-<version>-<content type>-...-<timestamp>.tar.gz`
//! - the entry listing, laid out as `<version>/<content type>/[<os>/<arch>/...]`
//!
//! Tokens that cannot be found are left empty (or `None`); rejecting them is
//! the validator's job, so that every problem is reported with the same
//! user-facing wording.

mod lister;
mod overview;

pub use lister::{ArchiveLister, TarLister};
pub use overview::ContentsOverview;

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;

/// Kind of an entry inside a tarball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    Other,
}

/// One entry of an archive listing, path as stored in the tarball
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self::new(path, EntryKind::File)
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self::new(path, EntryKind::Directory)
    }

    /// Path components with `./`, leading `/` and trailing `/` removed
    pub fn components(&self) -> Vec<&str> {
        path_components(&self.path)
    }
}

/// Split an in-archive path into its non-empty components
pub fn path_components(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

/// Identifying tokens of one tarball, computed once per invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// Base name of the tarball file
    pub file_name: String,
    /// Second `-`-delimited field of the file name
    pub version: String,
    /// Third `-`-delimited field of the file name; informational only
    pub content_type_from_name: String,
    /// Second path component of the representative entry
    pub content_type_from_archive: String,
    /// First path component of the representative entry
    pub top_level_dir: String,
    /// Third path component, only when the representative entry is deep enough
    pub os: Option<String>,
    /// Fourth path component cut at the first `.`
    pub arch: Option<String>,
}

impl ArchiveDescriptor {
    /// Inspect the tarball at `path` using `lister` for the entry listing
    pub fn inspect(path: &Path, lister: &dyn ArchiveLister) -> Result<Self> {
        let entries = lister.list(path)?;
        Ok(Self::from_listing(&file_name_of(path)?, &entries))
    }

    /// Build a descriptor from a file name and an already obtained listing
    pub fn from_listing(file_name: &str, entries: &[ArchiveEntry]) -> Self {
        let (version, content_type_from_name) = parse_file_name(file_name);

        let mut descriptor = Self {
            file_name: file_name.to_string(),
            version,
            content_type_from_name,
            content_type_from_archive: String::new(),
            top_level_dir: String::new(),
            os: None,
            arch: None,
        };

        if let Some(entry) = representative_entry(entries) {
            let parts = entry.components();
            descriptor.top_level_dir = parts.first().map(|s| s.to_string()).unwrap_or_default();
            descriptor.content_type_from_archive =
                parts.get(1).map(|s| s.to_string()).unwrap_or_default();
            if parts.len() >= PLATFORM_DEPTH {
                descriptor.os = Some(parts[2].to_string());
                descriptor.arch = strip_arch_suffix(parts[3]);
            }
        }

        descriptor
    }
}

impl fmt::Display for ArchiveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tarball:             {}", self.file_name)?;
        writeln!(f, "version:             {}", self.version)?;
        writeln!(f, "top-level directory: {}", self.top_level_dir)?;
        writeln!(f, "content type (name): {}", self.content_type_from_name)?;
        writeln!(f, "content type:        {}", self.content_type_from_archive)?;
        writeln!(f, "os:                  {}", self.os.as_deref().unwrap_or("-"))?;
        write!(f, "architecture:        {}", self.arch.as_deref().unwrap_or("-"))
    }
}

/// `<version>/<type>/<os>/<arch>` is the shallowest path carrying every token
const PLATFORM_DEPTH: usize = 4;

/// Pick the entry the tokens are read from
///
/// The first entry with at least four components wins. Archives without such
/// an entry (init tarballs, for instance) fall back to the deepest entry,
/// preferring the later one on ties, so that a leading lone version
/// directory is never chosen while deeper entries exist.
pub fn representative_entry(entries: &[ArchiveEntry]) -> Option<&ArchiveEntry> {
    if let Some(entry) = entries
        .iter()
        .find(|e| e.components().len() >= PLATFORM_DEPTH)
    {
        return Some(entry);
    }

    entries
        .iter()
        .filter(|e| !e.components().is_empty())
        .fold(None, |best: Option<&ArchiveEntry>, e| match best {
            Some(b) if b.components().len() > e.components().len() => Some(b),
            _ => Some(e),
        })
}

/// Extract `(version, content type)` from `eessi-<version>-<type>-...`
pub fn parse_file_name(file_name: &str) -> (String, String) {
    let mut fields = file_name.split('-');
    let _prefix = fields.next();
    let version = fields.next().unwrap_or_default().to_string();
    let content_type = fields.next().unwrap_or_default().to_string();
    (version, content_type)
}

/// Architecture directories may carry suffixes such as `x86_64.generic`
fn strip_arch_suffix(component: &str) -> Option<String> {
    let arch = component.split('.').next().unwrap_or_default();
    (!arch.is_empty()).then(|| arch.to_string())
}

pub(crate) fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Usage(format!("{} does not name a file", path.display())))
}
