// src/lib.rs

//! EESSI tarball ingestion
//!
//! Validates software-distribution tarballs against the EESSI
//! version/content-type/OS/architecture taxonomy and publishes them into a
//! CernVM-FS repository through `cvmfs_server`.
//!
//! # Architecture
//!
//! - Inspection: one pass over the tar listing yields an [`ArchiveDescriptor`]
//! - Validation: pure checks against a [`Taxonomy`], no I/O
//! - Dispatch: one workflow per [`ContentType`]
//! - Publication: every state change goes through a transaction/publish pair
//!   of a [`PublicationService`]

pub mod archive;
pub mod compression;
pub mod config;
pub mod dispatch;
mod error;
pub mod hash;
pub mod hooks;
pub mod ingest;
pub mod publish;
pub mod request;
pub mod taxonomy;
pub mod validate;

pub use archive::{ArchiveDescriptor, ArchiveEntry, ArchiveLister, ContentsOverview, TarLister};
pub use config::Config;
pub use dispatch::{DispatchOutcome, Workflow, dispatch};
pub use error::{Error, Result};
pub use hooks::CacheHelper;
pub use ingest::{IngestOptions, IngestOutcome, Inspection, Pipeline};
pub use publish::{CvmfsServer, PublicationService, PublishReport, Publisher, ServiceError, TagEntry};
pub use request::{Provenance, PublicationRequest};
pub use taxonomy::{ContentType, Taxonomy};
pub use validate::{Platform, ValidatedArchive, ValidationError, ValidationOptions, validate};
