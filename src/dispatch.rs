// src/dispatch.rs

//! Content-Type Dispatcher
//!
//! Each validated tarball goes through exactly one workflow, chosen by the
//! content type found inside it:
//!
//! | type     | workflow                                           |
//! |----------|----------------------------------------------------|
//! | init     | standard ingest                                    |
//! | scripts  | standard ingest                                    |
//! | software | standard ingest, then Lmod cache regeneration      |
//! | compat   | in-place replace if already published, else ingest |
//!
//! The compat replace is the only workflow that opens a transaction around
//! its own changes, and the only one that aborts it on failure.

use crate::compression::open_decompressed;
use crate::error::{Error, Result};
use crate::hooks::{self, CacheHelper};
use crate::publish::{PublicationService, PublishReport, Publisher};
use crate::request::PublicationRequest;
use crate::taxonomy::ContentType;
use crate::validate::Platform;
use std::fmt;
use std::io;
use std::path::Path;
use tar::Archive;
use tracing::{debug, error, info};

/// Which workflow ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    /// Bulk ingest with audit tag and catalog regeneration
    Ingest,
    /// Bulk ingest followed by Lmod cache regeneration
    IngestWithCacheUpdate,
    /// Existing compat layer replaced inside one transaction
    CompatReplace,
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest => write!(f, "ingest"),
            Self::IngestWithCacheUpdate => write!(f, "ingest + cache update"),
            Self::CompatReplace => write!(f, "compat layer replace"),
        }
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub workflow: Workflow,
    pub report: PublishReport,
}

/// Run the workflow for `request`'s content type
///
/// `cache_helper` overrides where the Lmod cache helper is looked up; it is
/// only consulted for software tarballs.
pub fn dispatch<S: PublicationService>(
    publisher: &mut Publisher<S>,
    request: &PublicationRequest,
    cache_helper: Option<&Path>,
) -> Result<DispatchOutcome> {
    let content_type = request.archive.content_type;
    debug!("Dispatching {} as {}", request.file_name(), content_type);

    match content_type {
        ContentType::Init | ContentType::Scripts => Ok(DispatchOutcome {
            workflow: Workflow::Ingest,
            report: publisher.ingest(request)?,
        }),
        ContentType::Software => {
            // Locate first: a missing helper must not leave an ingest behind
            let helper = CacheHelper::locate(cache_helper)?;
            let mut report = publisher.ingest(request)?;
            report
                .warnings
                .extend(hooks::regenerate_caches(publisher, &helper, request)?);
            Ok(DispatchOutcome {
                workflow: Workflow::IngestWithCacheUpdate,
                report,
            })
        }
        ContentType::Compat => {
            let platform = platform_of(request)?;
            let marker = publisher
                .repository()
                .compat_marker(request.version(), platform);
            if marker.exists() {
                info!(
                    "Compat layer {} already published, replacing it",
                    marker.parent().unwrap_or(marker.as_path()).display()
                );
                Ok(DispatchOutcome {
                    workflow: Workflow::CompatReplace,
                    report: replace_compat_layer(publisher, request, platform)?,
                })
            } else {
                debug!("No {} yet, ingesting as a new compat layer", marker.display());
                Ok(DispatchOutcome {
                    workflow: Workflow::Ingest,
                    report: publisher.ingest(request)?,
                })
            }
        }
    }
}

fn platform_of(request: &PublicationRequest) -> Result<&Platform> {
    request.archive.platform.as_ref().ok_or_else(|| {
        Error::Usage(format!(
            "{} is a {} tarball without OS and architecture",
            request.file_name(),
            request.archive.content_type
        ))
    })
}

/// Replace an already published compat layer in place
///
/// Removes the old `compat/<os>/<arch>` tree and unpacks the tarball over the
/// base directory in one transaction. Any failure once the transaction is
/// open aborts it and fails with [`Error::CompatUpdateAborted`].
pub fn replace_compat_layer<S: PublicationService>(
    publisher: &mut Publisher<S>,
    request: &PublicationRequest,
    platform: &Platform,
) -> Result<PublishReport> {
    publisher.begin_transaction()?;

    let message = format!(
        "updated compat layer for {}, {}, {}",
        request.version(),
        platform.os,
        platform.arch
    );

    if let Err(e) = apply_compat_update(publisher, request, platform, &message) {
        error!("Compat layer update failed: {}", e);
        let reason = match publisher.abort() {
            Ok(()) => e.to_string(),
            Err(abort_err) => format!("{} (abort failed as well: {})", e, abort_err),
        };
        return Err(Error::CompatUpdateAborted(reason));
    }
    info!("{}", message);

    let mut report = PublishReport::default();
    match hooks::tag_publication(publisher, request) {
        Ok(tag) => report.audit_tag = Some(tag),
        Err(e) => report.warn(format!("failed to add the audit tag: {}", e)),
    }
    Ok(report)
}

fn apply_compat_update<S: PublicationService>(
    publisher: &mut Publisher<S>,
    request: &PublicationRequest,
    platform: &Platform,
    message: &str,
) -> Result<()> {
    let repository = publisher.repository();
    let old_tree = repository.compat_path(request.version(), platform);
    let base_path = repository.base_path();

    info!("Removing {}", old_tree.display());
    std::fs::remove_dir_all(&old_tree).map_err(|e| {
        io::Error::new(e.kind(), format!("failed to remove {}: {}", old_tree.display(), e))
    })?;

    extract_into(&request.archive_path, &base_path)?;
    publisher.publish(message)
}

/// Unpack the tarball at `archive_path` below `dest`
///
/// Entry paths are taken relative to `dest`; permissions and mtimes are kept
/// and existing files are overwritten.
pub fn extract_into(archive_path: &Path, dest: &Path) -> Result<()> {
    debug!("Extracting {} into {}", archive_path.display(), dest.display());
    let mut archive = Archive::new(open_decompressed(archive_path)?);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_overwrite(true);
    archive.unpack(dest).map_err(|e| {
        Error::archive(archive_path, format!("failed to extract into {}: {}", dest.display(), e))
    })
}
