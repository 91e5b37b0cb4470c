// src/publish/mod.rs

//! Driving the transactional publication service
//!
//! The service (a CernVM-FS stratum 0 driven through `cvmfs_server`) is an
//! external collaborator reached through the [`PublicationService`] trait.
//! [`CvmfsServer`] is the production implementation; the [`Publisher`] layers
//! the ingestion workflow primitives on top of any implementation.
//!
//! Every state change goes through a transaction/publish pair. Locking is the
//! service's business: at most one open transaction per repository is
//! assumed and nothing here retries or times out.

mod coordinator;
mod cvmfs;

pub use coordinator::{Publisher, PublishReport};
pub use cvmfs::{CvmfsServer, parse_tag_listing};

use std::io::Read;
use thiserror::Error;

/// A failed call into the publication service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed for {repository}: {message}")]
pub struct ServiceError {
    /// Service primitive that failed, e.g. `publish`
    pub operation: &'static str,
    pub repository: String,
    /// Diagnostics captured from the service
    pub message: String,
}

impl ServiceError {
    pub fn new(operation: &'static str, repository: &str, message: impl Into<String>) -> Self {
        Self {
            operation,
            repository: repository.to_string(),
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// One entry of the repository's tag history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub name: String,
    /// Repository revision the tag points at
    pub revision: u64,
    /// Creation time, seconds since the epoch
    pub timestamp: u64,
    pub description: String,
}

/// Tags the service moves on every publish; they never name a revision
pub const MOVING_TAGS: &[&str] = &["trunk", "trunk-previous"];

impl TagEntry {
    pub fn is_moving(&self) -> bool {
        MOVING_TAGS.contains(&self.name.as_str())
    }
}

/// Pick the most recently created tag
///
/// Moving tags are skipped. Highest revision wins, then the newest
/// timestamp, then the later entry.
pub fn most_recent_tag(tags: &[TagEntry]) -> Option<&TagEntry> {
    tags.iter()
        .filter(|tag| !tag.is_moving())
        .fold(None, |best: Option<&TagEntry>, tag| match best {
            Some(b) if (b.revision, b.timestamp) > (tag.revision, tag.timestamp) => Some(b),
            _ => Some(tag),
        })
}

/// Primitives of the transactional publication service
pub trait PublicationService {
    /// Open a transaction on `repo`
    fn begin_transaction(&mut self, repo: &str) -> ServiceResult<()>;

    /// Bulk-ingest an uncompressed tar stream below `base_dir`
    fn ingest(
        &mut self,
        repo: &str,
        stream: &mut dyn Read,
        base_dir: &str,
        tag_message: &str,
    ) -> ServiceResult<()>;

    /// Publish the open transaction
    fn publish(&mut self, repo: &str, message: &str) -> ServiceResult<()>;

    /// Abort the open transaction, discarding its changes
    fn abort(&mut self, repo: &str) -> ServiceResult<()>;

    /// Tag history of `repo`
    fn list_tags(&mut self, repo: &str) -> ServiceResult<Vec<TagEntry>>;

    fn add_tag(&mut self, repo: &str, name: &str, message: &str) -> ServiceResult<()>;
}
