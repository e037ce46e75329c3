use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// A package dependency, identified across ecosystems
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub ecosystem: String,
    pub name: String,
}

impl Dependency {
    pub fn new(ecosystem: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            name: name.into(),
        }
    }
}

/// Completeness and structure markers found by the cheap heuristics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralFlags {
    pub has_readme: bool,
    pub has_tests: bool,
    pub has_ci: bool,
    pub has_license: bool,
    pub has_docs: bool,
    pub has_build_config: bool,
}

impl StructuralFlags {
    const COUNT: usize = 6;

    fn as_array(&self) -> [bool; Self::COUNT] {
        [
            self.has_readme,
            self.has_tests,
            self.has_ci,
            self.has_license,
            self.has_docs,
            self.has_build_config,
        ]
    }

    /// Fraction of flags set, in [0, 1]
    pub fn completeness(&self) -> f64 {
        let set = self.as_array().iter().filter(|f| **f).count();
        set as f64 / Self::COUNT as f64
    }

    /// Fraction of flags on which both sides agree, in [0, 1]
    pub fn match_fraction(&self, other: &Self) -> f64 {
        let equal = self
            .as_array()
            .iter()
            .zip(other.as_array().iter())
            .filter(|(a, b)| a == b)
            .count();
        equal as f64 / Self::COUNT as f64
    }

    pub fn all() -> Self {
        Self {
            has_readme: true,
            has_tests: true,
            has_ci: true,
            has_license: true,
            has_docs: true,
            has_build_config: true,
        }
    }
}

/// A work item as supplied by the upstream scanners.
///
/// Treated as read-only once built; the pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    pub name: String,
    /// Content fingerprint; any change invalidates cached analysis
    pub fingerprint: String,
    #[serde(default)]
    pub languages: BTreeSet<String>,
    #[serde(default)]
    pub primary_language: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<Dependency>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flags: StructuralFlags,
    /// Functional tags assigned by earlier passes
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Heuristic relevance score, higher is better
    #[serde(default)]
    pub cheap_score: f64,
    /// Declared source files and the mtime (ns since epoch) the scanner saw.
    /// Cached results are tied to these mtimes; `None` means whatever is on
    /// disk when the result is written.
    #[serde(default)]
    pub source_files: BTreeMap<PathBuf, Option<i64>>,
}

impl CandidateRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fingerprint: fingerprint.into(),
            languages: BTreeSet::new(),
            primary_language: None,
            dependencies: BTreeSet::new(),
            size_bytes: 0,
            file_count: 0,
            last_modified: None,
            flags: StructuralFlags::default(),
            tags: BTreeSet::new(),
            cheap_score: 0.0,
            source_files: BTreeMap::new(),
        }
    }

    /// Adds languages; the first one becomes primary if none is set
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for language in languages {
            let language = language.into();
            if self.primary_language.is_none() {
                self.primary_language = Some(language.clone());
            }
            self.languages.insert(language);
        }
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_flags(mut self, flags: StructuralFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_cheap_score(mut self, score: f64) -> Self {
        self.cheap_score = score;
        self
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    pub fn with_size(mut self, size_bytes: u64, file_count: u64) -> Self {
        self.size_bytes = size_bytes;
        self.file_count = file_count;
        self
    }

    pub fn with_source_file(mut self, path: impl Into<PathBuf>, mtime: Option<i64>) -> Self {
        self.source_files.insert(path.into(), mtime);
        self
    }
}
