use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use relative_path::{Component, RelativePath};
use serde::{Deserialize, Serialize};

use crate::models::Document;

/// What to do when a destination file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnExisting {
    /// Fail the placement.
    #[default]
    DoNotOverwrite,
    /// Leave the existing file alone and carry on.
    Ignore,
    /// Replace the existing file.
    YesOverwrite,
}

impl OnExisting {
    pub const ALL: [OnExisting; 3] = [
        OnExisting::DoNotOverwrite,
        OnExisting::Ignore,
        OnExisting::YesOverwrite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OnExisting::DoNotOverwrite => "do-not-overwrite",
            OnExisting::Ignore => "ignore",
            OnExisting::YesOverwrite => "yes-overwrite",
        }
    }
}

impl fmt::Display for OnExisting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown policy {0:?}, expected one of: do-not-overwrite, ignore, yes-overwrite")]
pub struct ParseOnExistingError(String);

impl FromStr for OnExisting {
    type Err = ParseOnExistingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OnExisting::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| ParseOnExistingError(s.to_string()))
    }
}

/// Outcome of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Written(PathBuf),
    /// The file existed and the policy said to leave it.
    Skipped(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    #[error("Document from {} has an empty destination {destination:?}", .source_path.display())]
    EmptyDestination {
        source_path: PathBuf,
        destination: String,
    },
    #[error("Destination {destination:?} from {} escapes the output directory", .source_path.display())]
    EscapesRoot {
        source_path: PathBuf,
        destination: String,
    },
    #[error("Refusing to overwrite existing file {}", .0.display())]
    Exists(PathBuf),
    #[error("Failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Persists documents under an output root.
pub trait Placer: Send + Sync {
    fn place(&self, output_root: &Path, doc: &Document) -> Result<Placement, PlaceError>;
}

/// Writes each document body to `output_root/destination_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPlacer {
    on_existing: OnExisting,
}

impl FsPlacer {
    pub fn new(on_existing: OnExisting) -> Self {
        Self { on_existing }
    }

    pub fn on_existing(&self) -> OnExisting {
        self.on_existing
    }
}

/// Maps a destination onto the output root. A leading `/` is not special:
/// every destination is relative to the root and must stay inside it.
pub fn resolve_destination(output_root: &Path, doc: &Document) -> Result<PathBuf, PlaceError> {
    let destination = &doc.destination_path;
    let relative = RelativePath::new(destination.trim_start_matches('/')).normalize();

    match relative.components().next() {
        None => Err(PlaceError::EmptyDestination {
            source_path: doc.source_path.clone(),
            destination: destination.clone(),
        }),
        Some(Component::ParentDir) => Err(PlaceError::EscapesRoot {
            source_path: doc.source_path.clone(),
            destination: destination.clone(),
        }),
        Some(_) => Ok(relative.to_path(output_root)),
    }
}

impl Placer for FsPlacer {
    fn place(&self, output_root: &Path, doc: &Document) -> Result<Placement, PlaceError> {
        let path = resolve_destination(output_root, doc)?;
        let io_err = |source| PlaceError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = match self.on_existing {
            OnExisting::YesOverwrite => fs::File::create(&path),
            OnExisting::DoNotOverwrite | OnExisting::Ignore => {
                OpenOptions::new().write(true).create_new(true).open(&path)
            }
        };
        let mut file = match file {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                if self.on_existing == OnExisting::Ignore {
                    log::info!("Leaving existing {} untouched", path.display());
                    return Ok(Placement::Skipped(path));
                }
                return Err(PlaceError::Exists(path));
            }
            Err(err) => return Err(io_err(err)),
        };

        file.write_all(doc.body.as_bytes()).map_err(io_err)?;
        log::info!(
            "Wrote {} ({} bytes) from {}",
            path.display(),
            doc.body.len(),
            doc.source_path.display()
        );
        Ok(Placement::Written(path))
    }
}
