// src/hooks.rs

//! Post-publication hooks
//!
//! - Audit tagging: links the revision an ingest produced to the change
//!   request it came from, via a `<lastTag>-meta` tag.
//! - Cache regeneration: runs the Lmod cache helper over a freshly
//!   published software version inside its own transaction.

use crate::error::{Error, Result};
use crate::publish::{PublicationService, Publisher, ServiceError};
use crate::request::PublicationRequest;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// File name of the cache helper looked up next to the executable
pub const CACHE_HELPER_NAME: &str = "update_lmod_caches.sh";

/// Suffix appended to the last tag to name the audit tag
pub const AUDIT_TAG_SUFFIX: &str = "-meta";

/// Message of the audit tag for `request`
pub fn audit_tag_message(request: &PublicationRequest) -> String {
    let p = &request.provenance;
    format!(
        "{} ingested from {} branch {} change {} submitted by {}",
        request.file_name(),
        p.source_repo,
        p.branch,
        p.change_id,
        p.submitter
    )
}

/// Tag the most recent revision with the provenance of `request`
///
/// Returns the name of the created tag.
pub fn tag_publication<S: PublicationService>(
    publisher: &mut Publisher<S>,
    request: &PublicationRequest,
) -> Result<String> {
    let last = publisher.latest_tag()?.ok_or_else(|| {
        ServiceError::new(
            "tag listing",
            &publisher.repository().name,
            "no tags to attach the audit tag to",
        )
    })?;

    let name = format!("{}{}", last.name, AUDIT_TAG_SUFFIX);
    publisher.add_tag(&name, &audit_tag_message(request))?;
    info!("Added audit tag {} for {}", name, request.file_name());
    Ok(name)
}

/// The helper that rebuilds Lmod caches of a published version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHelper {
    path: PathBuf,
}

impl CacheHelper {
    /// Find the helper at `configured`, or next to the running executable
    ///
    /// Fails if the helper does not exist or is not executable.
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        let path = match configured {
            Some(path) => path.to_path_buf(),
            None => {
                let exe = std::env::current_exe().map_err(|e| {
                    Error::CacheHelper(format!("cannot determine the executable location: {}", e))
                })?;
                exe.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(CACHE_HELPER_NAME)
            }
        };
        Self::at(path)
    }

    /// Use the helper at `path`, checking it exists and is executable
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|_| {
            Error::CacheHelper(format!("cannot find the cache update helper {}", path.display()))
        })?;
        if !metadata.is_file() || !is_executable(&metadata) {
            return Err(Error::CacheHelper(format!(
                "the cache update helper {} is not executable",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    /// Run the helper on `dir`; a non-zero exit becomes an error carrying stderr
    pub fn run(&self, dir: &Path) -> Result<()> {
        debug!("Running {} {}", self.path.display(), dir.display());
        let output = Command::new(&self.path)
            .arg(dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::CacheHelper(format!("failed to run {}: {}", self.path.display(), e))
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("[cache helper] {}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CacheHelper(format!(
                "{} exited with {}: {}",
                self.path.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

/// Regenerate the Lmod caches of the version `request` was ingested into
///
/// Transaction and publish failures are fatal. A failing helper is only a
/// warning: the transaction is still published so it does not stay open.
pub fn regenerate_caches<S: PublicationService>(
    publisher: &mut Publisher<S>,
    helper: &CacheHelper,
    request: &PublicationRequest,
) -> Result<Vec<String>> {
    let version_dir = publisher.repository().version_path(request.version());
    let mut warnings = Vec::new();

    publisher.begin_transaction()?;
    if let Err(e) = helper.run(&version_dir) {
        let message = format!("cache update for {} failed: {}", version_dir.display(), e);
        warn!("{}", message);
        warnings.push(message);
    }
    publisher.publish(&format!("update Lmod caches after ingesting {}", request.file_name()))?;
    info!("Lmod caches updated for {}", version_dir.display());
    Ok(warnings)
}
