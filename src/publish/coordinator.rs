// src/publish/coordinator.rs

//! Publication Coordinator
//!
//! Wraps the raw service primitives with the repository settings and the
//! bookkeeping every successful ingest gets: the audit tag and a nested
//! catalog regeneration.

use super::{PublicationService, TagEntry, most_recent_tag};
use crate::compression::open_decompressed;
use crate::config::{Config, RepositoryConfig};
use crate::error::Result;
use crate::hooks;
use crate::request::PublicationRequest;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Best-effort steps that failed after content was already published
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Name of the audit tag that was created, if any
    pub audit_tag: Option<String>,
    pub warnings: Vec<String>,
}

impl PublishReport {
    pub(crate) fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// A publication service bound to one repository
pub struct Publisher<S> {
    service: S,
    repository: RepositoryConfig,
    ingest_tag_message: String,
}

impl<S: PublicationService> Publisher<S> {
    pub fn new(service: S, repository: RepositoryConfig, ingest_tag_message: impl Into<String>) -> Self {
        Self {
            service,
            repository,
            ingest_tag_message: ingest_tag_message.into(),
        }
    }

    pub fn from_config(service: S, config: &Config) -> Self {
        Self::new(
            service,
            config.repository.clone(),
            config.service.ingest_tag_message.clone(),
        )
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn repository(&self) -> &RepositoryConfig {
        &self.repository
    }

    fn repo(&self) -> &str {
        &self.repository.name
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        debug!("Opening a transaction on {}", self.repository.name);
        self.service.begin_transaction(&self.repository.name)?;
        Ok(())
    }

    pub fn publish(&mut self, message: &str) -> Result<()> {
        debug!("Publishing {}: {}", self.repository.name, message);
        self.service.publish(&self.repository.name, message)?;
        Ok(())
    }

    pub fn abort(&mut self) -> Result<()> {
        warn!("Aborting the transaction on {}", self.repository.name);
        self.service.abort(&self.repository.name)?;
        Ok(())
    }

    /// Most recently created tag of the repository
    pub fn latest_tag(&mut self) -> Result<Option<TagEntry>> {
        let tags = self.service.list_tags(&self.repository.name)?;
        Ok(most_recent_tag(&tags).cloned())
    }

    pub fn add_tag(&mut self, name: &str, message: &str) -> Result<()> {
        self.service.add_tag(&self.repository.name, name, message)?;
        Ok(())
    }

    /// Bulk-ingest the tarball, then tag it and regenerate nested catalogs
    ///
    /// Only the ingest itself is fatal. Tagging and catalog regeneration
    /// failures end up as warnings in the returned report.
    pub fn ingest(&mut self, request: &PublicationRequest) -> Result<PublishReport> {
        let mut stream = open_decompressed(&request.archive_path)?;

        info!(
            "Ingesting {} into {}/{}",
            request.file_name(),
            self.repository.name,
            self.repository.base_dir
        );
        let started = Instant::now();
        let repo = self.repository.name.clone();
        self.service.ingest(
            &repo,
            &mut stream,
            self.repository.base_dir.trim_matches('/'),
            &self.ingest_tag_message,
        )?;
        info!(
            "{} has been ingested to {} in {:.1}s",
            request.file_name(),
            self.repo(),
            started.elapsed().as_secs_f64()
        );

        let mut report = PublishReport::default();
        match hooks::tag_publication(self, request) {
            Ok(tag) => report.audit_tag = Some(tag),
            Err(e) => report.warn(format!("failed to add the audit tag: {}", e)),
        }

        if let Err(e) = self.regenerate_nested_catalogs(request.file_name()) {
            report.warn(format!("failed to regenerate nested catalogs: {}", e));
        }

        Ok(report)
    }

    /// Publish an empty transaction so the service rebuilds nested catalogs
    ///
    /// The bulk ingest does not do this on its own.
    pub fn regenerate_nested_catalogs(&mut self, file_name: &str) -> Result<()> {
        self.begin_transaction()?;
        self.publish(&format!("Generate catalogs after ingesting {}", file_name))?;
        info!("Nested catalogs regenerated for {}", self.repo());
        Ok(())
    }
}
