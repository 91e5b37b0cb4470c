// src/archive/overview.rs

//! Human-readable overview of a tarball's contents
//!
//! Small tarballs are listed in full. Large software tarballs are reduced to
//! the installation directories (`<prefix>/software/<name>/<version>`), the
//! module files (`<prefix>/modules/<category>/<name>/*.lua`) and anything
//! living outside those two trees, which is what a reviewer needs to see.

use super::{ArchiveEntry, EntryKind, path_components};
use glob::{MatchOptions, Pattern};
use std::fmt;

/// Tarballs with fewer entries than this are listed in full
pub const FULL_LISTING_LIMIT: usize = 100;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentsOverview {
    /// Number of entries in the tarball
    pub total: usize,
    /// Whether `items` is a summary rather than the full listing
    pub summarized: bool,
    /// Sorted, normalised entry paths
    pub items: Vec<String>,
}

impl ContentsOverview {
    pub fn from_entries(entries: &[ArchiveEntry]) -> Self {
        let mut paths: Vec<String> = entries.iter().map(|e| normalise(&e.path)).collect();
        paths.sort();

        if entries.len() < FULL_LISTING_LIMIT {
            return Self {
                total: entries.len(),
                summarized: false,
                items: paths,
            };
        }

        let prefix = common_dir_prefix(&paths);
        let software_dirs = pattern(&prefix, "software/*/*");
        let module_files = pattern(&prefix, "modules/*/*/*.lua");
        let software_root = under(&prefix, "software");
        let modules_root = under(&prefix, "modules");

        let mut items: Vec<String> = entries
            .iter()
            .filter_map(|entry| {
                let path = normalise(&entry.path);
                let selected = match entry.kind {
                    EntryKind::Directory if software_dirs.matches_with(&path, MATCH_OPTIONS) => true,
                    EntryKind::File if module_files.matches_with(&path, MATCH_OPTIONS) => true,
                    _ => !is_descendant(&path, &software_root) && !is_descendant(&path, &modules_root),
                };
                selected.then_some(path)
            })
            .collect();
        items.sort();
        items.dedup();

        Self {
            total: entries.len(),
            summarized: true,
            items,
        }
    }
}

impl fmt::Display for ContentsOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total number of items in the tarball: {}", self.total)?;
        if self.summarized {
            writeln!(f, "Summarized overview of the contents of the tarball:")?;
        } else {
            writeln!(f, "Full listing of the contents of the tarball:")?;
        }
        for item in &self.items {
            writeln!(f, "  {}", item)?;
        }
        Ok(())
    }
}

fn normalise(path: &str) -> String {
    path_components(path).join("/")
}

/// Longest directory path shared by every entry
fn common_dir_prefix(paths: &[String]) -> String {
    let mut iter = paths.iter();
    let Some(first) = iter.next() else {
        return String::new();
    };

    // The last component of the shortest path may be a file, so the prefix
    // stops at the parent of every entry.
    let mut prefix: Vec<&str> = path_components(first);
    prefix.pop();
    for path in iter {
        let mut parts = path_components(path);
        parts.pop();
        let shared = prefix
            .iter()
            .zip(parts.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(shared);
    }
    prefix.join("/")
}

fn under(prefix: &str, dir: &str) -> String {
    if prefix.is_empty() {
        dir.to_string()
    } else {
        format!("{}/{}", prefix, dir)
    }
}

fn pattern(prefix: &str, rest: &str) -> Pattern {
    let escaped = if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", Pattern::escape(prefix), rest)
    };
    // Only literal prefix text and fixed wildcards end up here
    Pattern::new(&escaped).unwrap_or_default()
}

fn is_descendant(path: &str, dir: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}
