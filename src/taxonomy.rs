// src/taxonomy.rs

//! Allow-lists for the tokens an EESSI tarball may carry
//!
//! The taxonomy is an immutable value handed to the validator. The defaults
//! describe the production EESSI repository; the configuration file may
//! narrow or replace the architecture and OS lists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Architectures accepted for software and compat tarballs
pub const DEFAULT_ARCHITECTURES: &[&str] = &["aarch64", "ppc64le", "riscv64", "x86_64"];

/// Operating systems accepted for software and compat tarballs
pub const DEFAULT_OPERATING_SYSTEMS: &[&str] = &["linux", "macos"];

/// What a tarball's payload represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Initialisation scripts (`<version>/init/...`)
    Init,
    /// Helper scripts, e.g. GPU support (`<version>/scripts/...`)
    Scripts,
    /// Software installations (`<version>/software/<os>/<arch>/...`)
    Software,
    /// Compatibility layer (`<version>/compat/<os>/<arch>/...`)
    Compat,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [Self::Init, Self::Scripts, Self::Software, Self::Compat];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Scripts => "scripts",
            Self::Software => "software",
            Self::Compat => "compat",
        }
    }

    /// Software and compat payloads live below an `<os>/<arch>` subtree
    pub const fn requires_platform(&self) -> bool {
        matches!(self, Self::Software | Self::Compat)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// The allow-lists consulted by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    architectures: BTreeSet<String>,
    operating_systems: BTreeSet<String>,
    content_types: BTreeSet<ContentType>,
}

impl Taxonomy {
    pub fn new<A, O, C>(architectures: A, operating_systems: O, content_types: C) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
        C: IntoIterator<Item = ContentType>,
    {
        Self {
            architectures: architectures.into_iter().map(Into::into).collect(),
            operating_systems: operating_systems.into_iter().map(Into::into).collect(),
            content_types: content_types.into_iter().collect(),
        }
    }

    pub fn is_architecture(&self, arch: &str) -> bool {
        self.architectures.contains(arch)
    }

    pub fn is_operating_system(&self, os: &str) -> bool {
        self.operating_systems.contains(os)
    }

    /// Look up a content type token; unknown or disallowed tokens yield `None`
    pub fn content_type(&self, token: &str) -> Option<ContentType> {
        token
            .parse::<ContentType>()
            .ok()
            .filter(|ct| self.content_types.contains(ct))
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::new(
            DEFAULT_ARCHITECTURES.iter().copied(),
            DEFAULT_OPERATING_SYSTEMS.iter().copied(),
            ContentType::ALL,
        )
    }
}
