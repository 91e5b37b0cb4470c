// src/ingest.rs

//! End-to-end ingestion of one tarball
//!
//! inspect → validate → dispatch. Everything up to dispatch is local: a
//! tarball that fails a check never reaches the publication service.

use crate::archive::{ArchiveDescriptor, ArchiveLister, ContentsOverview, TarLister, file_name_of};
use crate::config::Config;
use crate::dispatch::{self, DispatchOutcome};
use crate::error::{Error, Result};
use crate::hash;
use crate::publish::{PublicationService, Publisher};
use crate::request::{Provenance, PublicationRequest};
use crate::taxonomy::Taxonomy;
use crate::validate::{self, ValidationOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-invocation knobs of the pipeline
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub validation: ValidationOptions,
    /// Digest the tarball must match before it is even listed
    pub expected_sha256: Option<String>,
    /// Explicit location of the Lmod cache helper
    pub cache_helper: Option<PathBuf>,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            validation: config.validation_options(),
            expected_sha256: None,
            cache_helper: config.hooks.cache_helper.clone(),
        }
    }
}

/// A tarball that passed every local check
#[derive(Debug, Clone)]
pub struct Inspection {
    pub request: PublicationRequest,
    pub overview: ContentsOverview,
}

/// Successful outcome of [`Pipeline::run`]
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub inspection: Inspection,
    pub dispatch: DispatchOutcome,
}

pub struct Pipeline {
    taxonomy: Taxonomy,
    options: IngestOptions,
    lister: Box<dyn ArchiveLister>,
}

impl Pipeline {
    pub fn new(taxonomy: Taxonomy, options: IngestOptions) -> Self {
        Self {
            taxonomy,
            options,
            lister: Box::new(TarLister),
        }
    }

    /// Replace the in-process tar lister
    pub fn with_lister(mut self, lister: Box<dyn ArchiveLister>) -> Self {
        self.lister = lister;
        self
    }

    /// Check, list and validate the tarball at `path` without publishing it
    pub fn inspect(&self, path: &Path, provenance: Provenance) -> Result<Inspection> {
        if !path.is_file() {
            return Err(Error::Usage(format!("tarball {} does not exist", path.display())));
        }

        if let Some(expected) = &self.options.expected_sha256 {
            hash::verify_sha256(path, expected)?;
        }

        let entries = self.lister.list(path)?;
        let descriptor = ArchiveDescriptor::from_listing(&file_name_of(path)?, &entries);
        debug!("Inspected {}:\n{}", path.display(), descriptor);

        let archive = validate::validate(&descriptor, &self.taxonomy, self.options.validation)?;
        info!(
            "{} is a valid {} tarball for EESSI {}",
            archive.file_name(),
            archive.content_type,
            archive.version()
        );

        Ok(Inspection {
            request: PublicationRequest::new(path, archive, provenance),
            overview: ContentsOverview::from_entries(&entries),
        })
    }

    /// Inspect the tarball at `path`, then publish it through `publisher`
    pub fn run<S: PublicationService>(
        &self,
        publisher: &mut Publisher<S>,
        path: &Path,
        provenance: Provenance,
    ) -> Result<IngestOutcome> {
        let inspection = self.inspect(path, provenance)?;
        let dispatch = dispatch::dispatch(
            publisher,
            &inspection.request,
            self.options.cache_helper.as_deref(),
        )?;
        info!(
            "{} published via {} with {} warning(s)",
            inspection.request.file_name(),
            dispatch.workflow,
            dispatch.report.warnings.len()
        );
        Ok(IngestOutcome {
            inspection,
            dispatch,
        })
    }
}
