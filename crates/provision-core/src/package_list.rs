//! Package list parsing.
//!
//! The list is a `dpkg -l` style listing: whitespace-delimited columns with the
//! package name in the second column, e.g.
//!
//! ```text
//! # status  name        version        arch   description
//! ii        ffmpeg      7:4.4.2-0ubuntu amd64  audio/video toolkit
//! ```

use std::path::Path;

use crate::error::{ProvisionError, ProvisionResult};

/// A package name together with the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub line: usize,
    pub name: String,
}

/// Ordered package names read from a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageList {
    pub entries: Vec<PackageEntry>,

    /// Lines with no second field; each still counts as a (failed) attempt.
    pub malformed: Vec<usize>,
}

impl PackageList {
    /// Parse listing text. Blank and `#` lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut list = PackageList::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_whitespace().nth(1) {
                Some(name) => list.entries.push(PackageEntry {
                    line: idx + 1,
                    name: name.to_string(),
                }),
                None => list.malformed.push(idx + 1),
            }
        }

        list
    }

    /// Read and parse a listing file. A missing file is an error.
    pub fn load(path: &Path) -> ProvisionResult<Self> {
        if !path.is_file() {
            return Err(ProvisionError::PackageListMissing {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// One item per install attempt in file order: the line number and the
    /// package name, `None` for a malformed line.
    pub fn attempts(&self) -> Vec<(usize, Option<&str>)> {
        let mut attempts: Vec<(usize, Option<&str>)> = self
            .entries
            .iter()
            .map(|e| (e.line, Some(e.name.as_str())))
            .chain(self.malformed.iter().map(|&line| (line, None)))
            .collect();
        attempts.sort_by_key(|(line, _)| *line);
        attempts
    }

    pub fn attempt_count(&self) -> usize {
        self.entries.len() + self.malformed.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
