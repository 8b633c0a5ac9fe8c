use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use regex::bytes::Regex;

use crate::scanner::BEGIN_MARKER;

/// Candidate streams keyed by absolute source path. Iteration order is the
/// sorted path order.
pub type Streams = BTreeMap<PathBuf, Box<dyn Read + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum FindError {
    #[error("Input path not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Invalid exclude pattern {pattern:?}: {source}")]
    Exclude {
        pattern: String,
        source: ignore::Error,
    },
    #[error("Failed to build marker pattern: {0}")]
    Marker(#[from] regex::Error),
}

/// Locates the streams under a root that may hold documents.
pub trait Finder: Send + Sync {
    fn find(&self, root: &Path) -> Result<Streams, FindError>;
}

/// Walks a directory tree on disk.
///
/// Hidden files are visited, `.git` directories never are. Ignore files
/// (`.gitignore`, `.ignore`, git excludes) only apply when enabled with
/// [`WalkFinder::respect_gitignore`]. Each regular file is read into memory;
/// binary files (any NUL byte) and files without the begin-statement marker
/// are left out.
#[derive(Debug, Clone)]
pub struct WalkFinder {
    exclude: Vec<String>,
    respect_gitignore: bool,
}

impl WalkFinder {
    pub fn new() -> Self {
        Self {
            exclude: Vec::new(),
            respect_gitignore: false,
        }
    }

    /// Add exclude patterns (gitignore glob syntax, relative to the root)
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    fn walker(&self, root: &Path) -> Result<WalkBuilder, FindError> {
        let mut overrides = OverrideBuilder::new(root);
        for pattern in &self.exclude {
            overrides
                .add(&format!("!{pattern}"))
                .map_err(|source| FindError::Exclude {
                    pattern: pattern.clone(),
                    source,
                })?;
        }
        let overrides = overrides.build().map_err(|source| FindError::Exclude {
            pattern: self.exclude.join(", "),
            source,
        })?;

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .parents(self.respect_gitignore)
            .overrides(overrides)
            .filter_entry(|entry| entry.file_name() != ".git");
        Ok(builder)
    }
}

impl Default for WalkFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Finder for WalkFinder {
    fn find(&self, root: &Path) -> Result<Streams, FindError> {
        let root = std::path::absolute(root).map_err(|source| FindError::Read {
            path: root.to_path_buf(),
            source,
        })?;
        if !root.exists() {
            return Err(FindError::NotFound(root));
        }

        let marker = marker_pattern()?;
        let streams = collect_candidates(self.walker(&root)?.build(), &marker);
        log::debug!(
            "{} files under {} contain documents",
            streams.len(),
            root.display()
        );
        Ok(streams)
    }
}

fn marker_pattern() -> Result<Regex, regex::Error> {
    Regex::new(&regex::escape(BEGIN_MARKER))
}

/// Reads every regular file among `entries`. Entries that cannot be walked or
/// read are logged and skipped.
fn collect_candidates(
    entries: impl IntoIterator<Item = Result<ignore::DirEntry, ignore::Error>>,
    marker: &Regex,
) -> Streams {
    let mut streams = Streams::new();
    let mut visited = 0usize;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        visited += 1;

        let path = entry.into_path();
        if let Some(bytes) = read_candidate(&path, marker) {
            log::info!("Found candidate {}", path.display());
            streams.insert(path, Box::new(io::Cursor::new(bytes)));
        }
    }

    log::debug!("Visited {visited} files");
    streams
}

/// The file's bytes, if it is a text file holding the marker.
fn read_candidate(path: &Path, marker: &Regex) -> Option<Vec<u8>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("Skipping {}: {err}", path.display());
            return None;
        }
    };
    if bytes.contains(&0) {
        log::debug!("Skipping binary file {}", path.display());
        return None;
    }
    marker.is_match(&bytes).then_some(bytes)
}

/// In-memory sources (useful for testing)
#[derive(Debug, Clone, Default)]
pub struct MemoryFinder(Vec<(PathBuf, String)>);

impl MemoryFinder {
    /// Create empty memory sources
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a file with content
    pub fn add(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.0.push((path.into(), content.into()));
        self
    }
}

impl Finder for MemoryFinder {
    fn find(&self, root: &Path) -> Result<Streams, FindError> {
        let mut streams = Streams::new();
        for (path, content) in &self.0 {
            if path.starts_with(root) && content.contains(BEGIN_MARKER) {
                streams.insert(
                    path.clone(),
                    Box::new(io::Cursor::new(content.clone().into_bytes())),
                );
            }
        }
        Ok(streams)
    }
}
