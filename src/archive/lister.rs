// src/archive/lister.rs

//! Listing the entries of a tarball without extracting it

use super::{ArchiveEntry, EntryKind};
use crate::compression::open_decompressed;
use crate::error::{Error, Result};
use std::path::Path;
use tar::{Archive, EntryType};
use tracing::debug;

/// Produces the ordered entry listing of an archive
pub trait ArchiveLister {
    /// List every entry in archive order; nothing is written to disk
    fn list(&self, path: &Path) -> Result<Vec<ArchiveEntry>>;
}

/// Lists tarballs in-process with the `tar` crate
///
/// Entry contents are skipped as the stream is read, so memory use stays
/// bounded by the path list itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarLister;

impl ArchiveLister for TarLister {
    fn list(&self, path: &Path) -> Result<Vec<ArchiveEntry>> {
        let reader = open_decompressed(path)?;
        let mut archive = Archive::new(reader);
        let mut entries = Vec::new();

        for entry in archive
            .entries()
            .map_err(|e| Error::archive(path, format!("failed to read entries: {}", e)))?
        {
            let entry =
                entry.map_err(|e| Error::archive(path, format!("failed to read entry: {}", e)))?;

            let entry_path = entry
                .path()
                .map_err(|e| Error::archive(path, format!("failed to get entry path: {}", e)))?
                .to_string_lossy()
                .to_string();

            let kind = match entry.header().entry_type() {
                EntryType::Directory => EntryKind::Directory,
                EntryType::Regular | EntryType::Continuous => EntryKind::File,
                EntryType::Symlink | EntryType::Link => EntryKind::Symlink,
                _ => EntryKind::Other,
            };

            entries.push(ArchiveEntry::new(entry_path, kind));
        }

        debug!("Listed {} entries in {}", entries.len(), path.display());
        Ok(entries)
    }
}
