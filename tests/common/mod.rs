// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use eessi_ingest::config::RepositoryConfig;
use eessi_ingest::publish::ServiceResult;
use eessi_ingest::{PublicationService, Publisher, ServiceError, TagEntry};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashSet;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const REPO: &str = "software.eessi.io";
pub const TAG_MESSAGE: &str = "ingested by eessi-ingest tests";

/// One call the service received, failed or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Transaction,
    Ingest { base_dir: String, tag_message: String },
    Publish(String),
    Abort,
    ListTags,
    AddTag { name: String, message: String },
}

/// In-memory publication service recording every call
///
/// Each successful ingest or publish creates an automatic `generic-<n>` tag,
/// the way the real service does. When `publish_root` is set, ingested tar
/// streams are unpacked there so later runs can see published content.
#[derive(Debug, Default)]
pub struct FakeService {
    pub calls: Vec<Call>,
    pub tags: Vec<TagEntry>,
    pub publish_root: Option<PathBuf>,
    failing: HashSet<&'static str>,
    revision: u64,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unpack ingested streams below `root`
    pub fn publishing_into(root: impl Into<PathBuf>) -> Self {
        Self {
            publish_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Make `operation` (`transaction`, `ingest`, `publish`, `abort`,
    /// `tag listing`, `tag`) fail from now on
    pub fn fail_on(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    fn check(&self, operation: &'static str, repo: &str) -> ServiceResult<()> {
        if self.failing.contains(operation) {
            return Err(ServiceError::new(operation, repo, "injected failure"));
        }
        Ok(())
    }

    fn new_revision(&mut self) {
        self.revision += 1;
        self.tags.push(TagEntry {
            name: format!("generic-{}", self.revision),
            revision: self.revision,
            timestamp: 1_714_000_000 + self.revision,
            description: String::new(),
        });
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn published_messages(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Publish(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl PublicationService for FakeService {
    fn begin_transaction(&mut self, repo: &str) -> ServiceResult<()> {
        self.calls.push(Call::Transaction);
        self.check("transaction", repo)
    }

    fn ingest(
        &mut self,
        repo: &str,
        stream: &mut dyn Read,
        base_dir: &str,
        tag_message: &str,
    ) -> ServiceResult<()> {
        self.calls.push(Call::Ingest {
            base_dir: base_dir.to_string(),
            tag_message: tag_message.to_string(),
        });
        self.check("ingest", repo)?;

        let consumed = match &self.publish_root {
            Some(root) => tar::Archive::new(stream).unpack(root.join(base_dir)),
            None => io::copy(stream, &mut io::sink()).map(|_| ()),
        };
        consumed.map_err(|e| ServiceError::new("ingest", repo, e.to_string()))?;
        self.new_revision();
        Ok(())
    }

    fn publish(&mut self, repo: &str, message: &str) -> ServiceResult<()> {
        self.calls.push(Call::Publish(message.to_string()));
        self.check("publish", repo)?;
        self.new_revision();
        Ok(())
    }

    fn abort(&mut self, repo: &str) -> ServiceResult<()> {
        self.calls.push(Call::Abort);
        self.check("abort", repo)
    }

    fn list_tags(&mut self, repo: &str) -> ServiceResult<Vec<TagEntry>> {
        self.calls.push(Call::ListTags);
        self.check("tag listing", repo)?;
        Ok(self.tags.clone())
    }

    fn add_tag(&mut self, repo: &str, name: &str, message: &str) -> ServiceResult<()> {
        self.calls.push(Call::AddTag {
            name: name.to_string(),
            message: message.to_string(),
        });
        self.check("tag", repo)?;
        self.tags.push(TagEntry {
            name: name.to_string(),
            revision: self.revision,
            timestamp: 1_714_000_000 + self.revision,
            description: message.to_string(),
        });
        Ok(())
    }
}

/// A mounted repository living in a temporary directory
pub struct TestRepo {
    pub dir: TempDir,
    pub config: RepositoryConfig,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = RepositoryConfig {
            name: REPO.to_string(),
            base_dir: "versions".to_string(),
            mount_root: dir.path().join("cvmfs"),
        };
        std::fs::create_dir_all(config.base_path()).unwrap();
        Self { dir, config }
    }

    /// Directory the fake service unpacks ingests below
    pub fn repo_root(&self) -> PathBuf {
        self.config.repo_root()
    }

    /// A publisher backed by a fake service publishing into this repository
    pub fn publisher(&self) -> Publisher<FakeService> {
        self.publisher_with(FakeService::publishing_into(self.repo_root()))
    }

    pub fn publisher_with(&self, service: FakeService) -> Publisher<FakeService> {
        Publisher::new(service, self.config.clone(), TAG_MESSAGE)
    }

    /// Create a published file below the base directory
    pub fn publish_file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.config.base_path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Directory for tarballs and helpers, outside the repository
    pub fn scratch(&self) -> PathBuf {
        let scratch = self.dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        scratch
    }
}

/// Write a gzipped tarball at `path` holding `files` in order
pub fn write_tarball(path: &Path, files: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Write a tarball named `name` in `dir` with placeholder contents
pub fn tarball(dir: &Path, name: &str, paths: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let files: Vec<(&str, &str)> = paths.iter().map(|p| (*p, "payload\n")).collect();
    write_tarball(&path, &files);
    path
}

/// Install an executable shell script as the cache helper
#[cfg(unix)]
pub fn install_helper(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("update_lmod_caches.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
