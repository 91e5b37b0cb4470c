// src/request.rs

//! What one invocation asks to publish, and who asked for it

use crate::validate::ValidatedArchive;
use std::path::PathBuf;

/// The change request a tarball came from
///
/// Only used to build the audit tag after publication; it never influences
/// validation or dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// `owner/name` of the repository the change request was made against
    pub source_repo: String,
    pub branch: String,
    /// Pull request number or commit id
    pub change_id: String,
    pub submitter: String,
}

impl Provenance {
    pub fn new(
        source_repo: impl Into<String>,
        branch: impl Into<String>,
        change_id: impl Into<String>,
        submitter: impl Into<String>,
    ) -> Self {
        Self {
            source_repo: source_repo.into(),
            branch: branch.into(),
            change_id: change_id.into(),
            submitter: submitter.into(),
        }
    }
}

/// A validated tarball plus its provenance, consumed by exactly one workflow
#[derive(Debug, Clone)]
pub struct PublicationRequest {
    pub archive_path: PathBuf,
    pub archive: ValidatedArchive,
    pub provenance: Provenance,
}

impl PublicationRequest {
    pub fn new(archive_path: impl Into<PathBuf>, archive: ValidatedArchive, provenance: Provenance) -> Self {
        Self {
            archive_path: archive_path.into(),
            archive,
            provenance,
        }
    }

    pub fn file_name(&self) -> &str {
        self.archive.file_name()
    }

    pub fn version(&self) -> &str {
        self.archive.version()
    }
}
