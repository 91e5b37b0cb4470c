// src/validate.rs

//! Taxonomy validation of an inspected tarball
//!
//! A pure check of an [`ArchiveDescriptor`] against a [`Taxonomy`]. Checks run
//! in a fixed order and stop at the first failure:
//!
//! 1. the version from the file name is present and looks like `YYYY.MM`
//! 2. the top-level directory in the tarball equals that version
//! 3. the content type in the tarball is a known one
//! 4. software and compat tarballs name a known OS and architecture
//! 5. optionally, the content type in the file name matches the tarball
//!
//! Check 5 is off by default: some producers mislabel the file name of
//! tarballs that only carry init payloads.

use crate::archive::ArchiveDescriptor;
use crate::taxonomy::{ContentType, Taxonomy};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^20[0-9]{2}\.(0[1-9]|1[0-2])$").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("EESSI version cannot be derived from the filename {0}")]
    MissingVersion(String),

    #[error("{0} is not a valid EESSI version")]
    InvalidVersion(String),

    #[error("no top level directory can be found in the tarball")]
    MissingTopLevelDir,

    #[error(
        "the version in the filename ({version}) does not match the top-level directory in the tarball ({top_level_dir})"
    )]
    VersionMismatch {
        version: String,
        top_level_dir: String,
    },

    #[error("could not derive the content type of the tarball from its contents")]
    MissingContentType,

    #[error("the content type in the tarball is {0}, which is not a valid content type")]
    UnknownContentType(String),

    #[error("no operating system directory found in the tarball")]
    MissingOs,

    #[error(
        "the operating system directory in the tarball is {0}, which is not a valid operating system"
    )]
    UnsupportedOs(String),

    #[error("no architecture directory found in the tarball")]
    MissingArch,

    #[error("the architecture directory in the tarball is {0}, which is not a valid architecture")]
    UnsupportedArch(String),

    #[error("could not derive the content type of the tarball from the filename")]
    MissingNameContentType,

    #[error(
        "the contents type in the filename ({from_name}) does not match the contents type in the tarball ({from_archive})"
    )]
    ContentTypeMismatch {
        from_name: String,
        from_archive: String,
    },
}

/// Switches for optional checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Cross-check the file name's content type against the tarball's
    pub check_filename_content_type: bool,
}

/// OS and architecture a software or compat tarball targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

/// A descriptor that passed validation, ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedArchive {
    pub descriptor: ArchiveDescriptor,
    pub content_type: ContentType,
    /// Present exactly when `content_type.requires_platform()`
    pub platform: Option<Platform>,
}

impl ValidatedArchive {
    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn file_name(&self) -> &str {
        &self.descriptor.file_name
    }
}

/// Run every check against `descriptor`
pub fn validate(
    descriptor: &ArchiveDescriptor,
    taxonomy: &Taxonomy,
    options: ValidationOptions,
) -> Result<ValidatedArchive, ValidationError> {
    check_version(&descriptor.version, &descriptor.file_name)?;
    check_top_level_dir(&descriptor.version, &descriptor.top_level_dir)?;
    let content_type = check_content_type(&descriptor.content_type_from_archive, taxonomy)?;

    let platform = if content_type.requires_platform() {
        Some(check_platform(
            descriptor.os.as_deref(),
            descriptor.arch.as_deref(),
            taxonomy,
        )?)
    } else {
        None
    };

    if options.check_filename_content_type {
        check_filename_content_type(
            &descriptor.content_type_from_name,
            &descriptor.content_type_from_archive,
        )?;
    }

    Ok(ValidatedArchive {
        descriptor: descriptor.clone(),
        content_type,
        platform,
    })
}

/// Whether `version` has the `YYYY.MM` shape of an EESSI version
pub fn is_valid_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

pub fn check_version(version: &str, file_name: &str) -> Result<(), ValidationError> {
    if version.is_empty() {
        return Err(ValidationError::MissingVersion(file_name.to_string()));
    }
    if !is_valid_version(version) {
        return Err(ValidationError::InvalidVersion(version.to_string()));
    }
    Ok(())
}

pub fn check_top_level_dir(version: &str, top_level_dir: &str) -> Result<(), ValidationError> {
    if top_level_dir.is_empty() {
        return Err(ValidationError::MissingTopLevelDir);
    }
    if version != top_level_dir {
        return Err(ValidationError::VersionMismatch {
            version: version.to_string(),
            top_level_dir: top_level_dir.to_string(),
        });
    }
    Ok(())
}

pub fn check_content_type(token: &str, taxonomy: &Taxonomy) -> Result<ContentType, ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::MissingContentType);
    }
    taxonomy
        .content_type(token)
        .ok_or_else(|| ValidationError::UnknownContentType(token.to_string()))
}

pub fn check_platform(
    os: Option<&str>,
    arch: Option<&str>,
    taxonomy: &Taxonomy,
) -> Result<Platform, ValidationError> {
    let os = os.filter(|s| !s.is_empty()).ok_or(ValidationError::MissingOs)?;
    if !taxonomy.is_operating_system(os) {
        return Err(ValidationError::UnsupportedOs(os.to_string()));
    }

    let arch = arch.filter(|s| !s.is_empty()).ok_or(ValidationError::MissingArch)?;
    if !taxonomy.is_architecture(arch) {
        return Err(ValidationError::UnsupportedArch(arch.to_string()));
    }

    Ok(Platform {
        os: os.to_string(),
        arch: arch.to_string(),
    })
}

/// Cross-check the file name's content type against the tarball's
pub fn check_filename_content_type(
    from_name: &str,
    from_archive: &str,
) -> Result<(), ValidationError> {
    if from_name.is_empty() {
        return Err(ValidationError::MissingNameContentType);
    }
    if from_name != from_archive {
        return Err(ValidationError::ContentTypeMismatch {
            from_name: from_name.to_string(),
            from_archive: from_archive.to_string(),
        });
    }
    Ok(())
}
