//! Directory candidate generation.
//!
//! Candidates come from two directions around the scan origin:
//!
//! ```text
//!   /src/vendor            depth 2  (ancestor)
//!   /src/vendor/zlib       depth 1  (ancestor)
//!   /src/vendor/zlib/lib   depth 0  (origin)
//!   .../lib/contrib        depth 1  (descendant)
//!   .../lib/contrib/minizip depth 2 (descendant)
//! ```
//!
//! Only meaningful directories become candidates: at least `min_files`
//! relevant source files in the directory or its immediate subdirectories,
//! or at least one such file plus a package indicator (build manifest,
//! README, LICENSE).

use super::addressing::ContentAddresser;
use crate::config::DiscoveryConfig;
use crate::models::{CandidateRelation, ContentIdentifier, DirectoryCandidate};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use walkdir::WalkDir;

/// Directory names never scanned.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    "node_modules",
    "bower_components",
    "target",
    "build",
    "dist",
    "out",
    ".idea",
    ".vscode",
    ".vs",
    "venv",
    "env",
    ".env",
    ".venv",
];

/// File extensions counted as relevant source files.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "h", "cpp", "hpp", "cc", "cxx", "hxx", "C", "H", "py", "pyx", "pxd", "pyi", "js", "jsx",
    "ts", "tsx", "mjs", "cjs", "java", "kt", "kts", "rs", "go", "rb", "swift", "sh", "bash", "zsh",
    "fish", "yaml", "yml", "json", "xml", "toml",
];

/// File names that mark a package root.
pub const PACKAGE_INDICATORS: &[&str] = &[
    "CMakeLists.txt",
    "Makefile",
    "configure",
    "configure.ac",
    "meson.build",
    "setup.py",
    "pyproject.toml",
    "package.json",
    "Cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
];

/// Subdirectories looked at first; their contents rarely change between releases.
const PRIORITY_SUBDIRS: &[&str] = &[
    "cmake",
    "docs",
    "doc",
    "tools",
    "packaging",
    "data",
    "po",
    "translations",
    "config",
    "scripts",
];

/// Produces [`DirectoryCandidate`]s around a scan origin.
#[derive(Debug, Clone)]
pub struct CandidateScanner {
    addresser: ContentAddresser,
    max_depth: usize,
    min_files: usize,
    max_subdirectories: usize,
}

impl CandidateScanner {
    /// Creates a scanner.
    #[must_use]
    pub const fn new(
        addresser: ContentAddresser,
        max_depth: usize,
        min_files: usize,
        max_subdirectories: usize,
    ) -> Self {
        Self {
            addresser,
            max_depth,
            min_files,
            max_subdirectories,
        }
    }

    /// Creates a scanner from discovery settings.
    #[must_use]
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(
            ContentAddresser::with_excludes(&config.hash_excludes),
            config.max_depth,
            config.min_files,
            config.max_subdirectory_candidates,
        )
    }

    /// Generates candidates ordered by specificity (desc), depth, then path.
    ///
    /// Directories that fail to hash are skipped. Candidates sharing an
    /// identifier are collapsed to the most specific one. Scanning stops
    /// early, returning what it has, once `token` is cancelled.
    #[instrument(level = "debug", skip(self, origin, token), fields(origin = %origin.display()))]
    pub fn scan(&self, origin: &Path, token: &CancellationToken) -> Vec<DirectoryCandidate> {
        let mut found = Vec::new();

        for (path, depth, relation) in self.ancestor_chain(origin) {
            if token.is_cancelled() {
                break;
            }
            if let Some(candidate) = self.candidate(path, depth, relation) {
                found.push(candidate);
            }
        }

        for (path, depth) in self.subdirectories(origin) {
            if token.is_cancelled() {
                break;
            }
            if let Some(candidate) = self.candidate(path, depth, CandidateRelation::Descendant) {
                found.push(candidate);
            }
        }

        found.sort_by(|a, b| {
            b.specificity_score()
                .total_cmp(&a.specificity_score())
                .then(a.depth().cmp(&b.depth()))
                .then_with(|| a.path().cmp(b.path()))
        });

        let mut seen: HashSet<ContentIdentifier> = HashSet::new();
        found.retain(|c| seen.insert(*c.identifier()));

        tracing::debug!(candidates = found.len(), "Candidate scan complete");
        found
    }

    /// Returns true for files with a relevant source extension.
    #[must_use]
    pub fn is_relevant_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
    }

    /// Returns true when a directory may contain package content.
    #[must_use]
    pub fn is_meaningful(&self, dir: &Path) -> bool {
        if dir.file_name().and_then(|n| n.to_str()).is_some_and(is_skipped_name) {
            return false;
        }
        self.has_relevant_content(dir)
    }

    /// Content rules of [`is_meaningful`](Self::is_meaningful), without the
    /// name check. The scan origin is judged by content only.
    fn has_relevant_content(&self, dir: &Path) -> bool {
        if !dir.is_dir() {
            return false;
        }

        let Ok(entries) = fs::read_dir(dir) else {
            return false;
        };
        let mut count = 0usize;
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_file() && Self::is_relevant_file(&path) {
                count += 1;
                if count >= self.min_files {
                    return true;
                }
            } else if file_type.is_dir()
                && !entry.file_name().to_str().is_some_and(is_skipped_name)
            {
                subdirs.push(path);
            }
        }

        for sub in subdirs {
            let Ok(entries) = fs::read_dir(&sub) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry.file_type().is_ok_and(|t| t.is_file())
                    && Self::is_relevant_file(&entry.path())
                {
                    count += 1;
                    if count >= self.min_files {
                        return true;
                    }
                }
            }
        }

        count > 0 && has_package_indicator(dir)
    }

    /// Counts relevant files below a directory, ignoring skipped directories.
    #[must_use]
    pub fn count_relevant_files(dir: &Path) -> usize {
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_entry(e))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && Self::is_relevant_file(e.path()))
            .count()
    }

    fn candidate(
        &self,
        path: PathBuf,
        depth: usize,
        relation: CandidateRelation,
    ) -> Option<DirectoryCandidate> {
        let meaningful = if relation == CandidateRelation::Origin {
            self.has_relevant_content(&path)
        } else {
            self.is_meaningful(&path)
        };
        if !meaningful {
            return None;
        }
        match self.addresser.identify(&path) {
            Ok(identifier) => {
                let file_count = Self::count_relevant_files(&path);
                tracing::debug!(
                    path = %path.display(),
                    depth,
                    file_count,
                    "Directory candidate"
                );
                Some(DirectoryCandidate::new(path, identifier, depth, relation, file_count))
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unhashable directory");
                None
            },
        }
    }

    fn ancestor_chain(&self, origin: &Path) -> Vec<(PathBuf, usize, CandidateRelation)> {
        let mut chain = vec![(origin.to_path_buf(), 0, CandidateRelation::Origin)];
        let mut current = origin;
        for depth in 1..=self.max_depth {
            let Some(parent) = current.parent() else {
                break;
            };
            if parent.as_os_str().is_empty() {
                break;
            }
            chain.push((parent.to_path_buf(), depth, CandidateRelation::Ancestor));
            current = parent;
        }
        chain
    }

    fn subdirectories(&self, origin: &Path) -> Vec<(PathBuf, usize)> {
        if self.max_depth == 0 || self.max_subdirectories == 0 {
            return Vec::new();
        }

        let mut dirs: Vec<(PathBuf, usize)> = WalkDir::new(origin)
            .min_depth(1)
            .max_depth(self.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_type().is_dir() && !is_skipped_entry(e))
            .filter_map(Result::ok)
            .map(|e| (e.path().to_path_buf(), e.depth()))
            .collect();

        dirs.sort_by(|a, b| {
            let pa = is_priority(&a.0, origin);
            let pb = is_priority(&b.0, origin);
            pb.cmp(&pa).then(a.1.cmp(&b.1)).then_with(|| a.0.cmp(&b.0))
        });

        dirs.into_iter()
            .filter(|(path, _)| self.is_meaningful(path))
            .take(self.max_subdirectories)
            .collect()
    }
}

fn is_skipped_name(name: &str) -> bool {
    SKIP_DIRS.contains(&name) || (name.starts_with('.') && name != "." && name != "..")
}

fn is_skipped_entry(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(is_skipped_name)
}

fn is_priority(path: &Path, origin: &Path) -> bool {
    path.parent() == Some(origin)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| PRIORITY_SUBDIRS.contains(&n))
}

fn has_package_indicator(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            return false;
        };
        PACKAGE_INDICATORS.contains(&name)
            || name.starts_with("README")
            || name.starts_with("LICENSE")
            || name.starts_with("COPYING")
    })
}
