// src/config.rs

//! Configuration for the ingestion tool
//!
//! Read from a TOML file; every key has a default matching the production
//! EESSI setup, so an absent file means "use the defaults".
//!
//! # Example config.toml
//!
//! ```toml
//! [repository]
//! name = "software.eessi.io"
//! base_dir = "versions"
//! mount_root = "/cvmfs"
//!
//! [service]
//! cvmfs_server = "/usr/bin/cvmfs_server"
//!
//! [hooks]
//! cache_helper = "/usr/local/libexec/eessi/update_lmod_caches.sh"
//!
//! [validation]
//! check_filename_content_type = false
//!
//! [taxonomy]
//! architectures = ["aarch64", "x86_64"]
//! ```

use crate::error::{Error, Result};
use crate::taxonomy::{ContentType, DEFAULT_ARCHITECTURES, DEFAULT_OPERATING_SYSTEMS, Taxonomy};
use crate::validate::{Platform, ValidationOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Location of the configuration file when none is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/eessi-ingest/config.toml";

/// File whose presence marks an already published compat layer
pub const COMPAT_MARKER_FILE: &str = "startprefix";

/// Marker message attached to every bulk ingest
pub const DEFAULT_INGEST_TAG_MESSAGE: &str = "ingested by eessi-ingest";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub service: ServiceConfig,
    pub hooks: HooksConfig,
    pub validation: ValidationConfig,
    pub taxonomy: TaxonomyConfig,
}

/// Where the published tree lives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// CernVM-FS repository name
    pub name: String,
    /// Subdirectory of the repository all tarballs are ingested below
    pub base_dir: String,
    /// Directory the repository is mounted under on the publisher
    pub mount_root: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: "software.eessi.io".to_string(),
            base_dir: "versions".to_string(),
            mount_root: PathBuf::from("/cvmfs"),
        }
    }
}

impl RepositoryConfig {
    /// `<mount_root>/<name>`
    pub fn repo_root(&self) -> PathBuf {
        self.mount_root.join(&self.name)
    }

    /// `<mount_root>/<name>/<base_dir>`, the directory tarball paths are relative to
    pub fn base_path(&self) -> PathBuf {
        self.repo_root().join(self.base_dir.trim_matches('/'))
    }

    /// Published directory of one EESSI version
    pub fn version_path(&self, version: &str) -> PathBuf {
        self.base_path().join(version)
    }

    /// Published compat layer of one version/OS/architecture
    pub fn compat_path(&self, version: &str, platform: &Platform) -> PathBuf {
        self.version_path(version)
            .join(ContentType::Compat.as_str())
            .join(&platform.os)
            .join(&platform.arch)
    }

    /// Marker file signalling that the compat layer is already published
    pub fn compat_marker(&self, version: &str, platform: &Platform) -> PathBuf {
        self.compat_path(version, platform).join(COMPAT_MARKER_FILE)
    }

    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config(
                "repository.name has to be set to the name of the CVMFS repository".to_string(),
            ));
        }
        if self.base_dir.trim_matches('/').is_empty() {
            return Err(Error::Config(
                "repository.base_dir has to be set to a subdirectory of the CVMFS repository"
                    .to_string(),
            ));
        }
        if self.base_dir.split('/').any(|c| c == "..") {
            return Err(Error::Config(format!(
                "repository.base_dir '{}' must stay inside the repository",
                self.base_dir
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// `cvmfs_server` program name or path
    pub cvmfs_server: String,
    pub ingest_tag_message: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cvmfs_server: "cvmfs_server".to_string(),
            ingest_tag_message: DEFAULT_INGEST_TAG_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HooksConfig {
    /// Cache update helper; defaults to a helper next to the executable
    pub cache_helper: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub check_filename_content_type: bool,
}

/// Overrides of the built-in allow-lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaxonomyConfig {
    pub architectures: Option<Vec<String>>,
    pub operating_systems: Option<Vec<String>>,
    /// May only narrow the four known content types
    pub content_types: Option<Vec<ContentType>>,
}

impl TaxonomyConfig {
    pub fn to_taxonomy(&self) -> Taxonomy {
        let architectures = self
            .architectures
            .clone()
            .unwrap_or_else(|| DEFAULT_ARCHITECTURES.iter().map(|s| s.to_string()).collect());
        let operating_systems = self
            .operating_systems
            .clone()
            .unwrap_or_else(|| DEFAULT_OPERATING_SYSTEMS.iter().map(|s| s.to_string()).collect());
        let content_types = self
            .content_types
            .clone()
            .unwrap_or_else(|| ContentType::ALL.to_vec());
        Taxonomy::new(architectures, operating_systems, content_types)
    }
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("unable to read configuration file {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
    }

    /// Load `path` if given, otherwise the default file if it exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(Path::new(DEFAULT_CONFIG_PATH)),
            None => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn check(&self) -> Result<()> {
        self.repository.check()?;
        if self.service.cvmfs_server.trim().is_empty() {
            return Err(Error::Config("service.cvmfs_server must not be empty".to_string()));
        }
        for (key, list) in [
            ("taxonomy.architectures", &self.taxonomy.architectures),
            ("taxonomy.operating_systems", &self.taxonomy.operating_systems),
        ] {
            if list.as_ref().is_some_and(|l| l.is_empty()) {
                return Err(Error::Config(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.taxonomy.to_taxonomy()
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            check_filename_content_type: self.validation.check_filename_content_type,
        }
    }
}
