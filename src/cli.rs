// src/cli.rs
//! CLI definitions for eessi-ingest
//!
//! One invocation ingests one tarball. The positional arguments identify the
//! tarball and the change request it was built from; the latter only ends up
//! in the audit tag.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "eessi-ingest")]
#[command(author = "EESSI Contributors")]
#[command(version)]
#[command(about = "Validate an EESSI tarball and ingest it into a CernVM-FS repository", long_about = None)]
pub struct Cli {
    /// Path to the tarball (eessi-<version>-<type>-...-<timestamp>.tar.gz)
    pub archive: PathBuf,

    /// Repository the change request was made against (owner/name)
    pub source_repo: String,

    /// Branch of the change request
    pub branch: String,

    /// Pull request number or commit id
    pub change_id: String,

    /// Who submitted the change request
    pub submitter: String,

    /// Configuration file [default: /etc/eessi-ingest/config.toml if present]
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Require the content type in the file name to match the tarball contents
    #[arg(long)]
    pub check_filename_type: bool,

    /// Expected SHA-256 digest of the tarball
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Inspect and validate only; show what would be ingested
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
