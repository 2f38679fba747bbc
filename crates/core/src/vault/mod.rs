//! Vault access: discovering, reading and writing markdown notes.
//!
//! The vault is the system of record. Everything else in the crate is derived
//! from what [`Vault::load_note`] returns.

pub mod extractor;
pub mod walker;

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::model::{DateSource, Note, NoteId};

pub use extractor::{extract_date, extract_title};
pub use walker::{VaultWalker, WalkedFile};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault root does not exist: {0}")]
    MissingRoot(String),

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("invalid note path {path}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("failed to walk vault directory {root}: {source}")]
    Walk {
        root: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl VaultError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound(path.display().to_string());
        }
        Self::Io { path: path.display().to_string(), source }
    }
}

/// Storage backend holding the markdown notes.
///
/// Paths are vault-relative and slash-separated; they double as note ids.
pub trait Vault: Send + Sync {
    fn root(&self) -> &Path;

    /// Every note path under the root, sorted.
    fn list_note_paths(&self) -> Result<Vec<String>, VaultError>;

    fn load_note(&self, path: &str) -> Result<Note, VaultError>;

    /// Replace (or create) the note at `path` with `content`.
    fn write_note(&self, path: &str, content: &str) -> Result<(), VaultError>;

    /// Create the note only if nothing exists at `path`. Returns whether the
    /// file was created.
    fn create_note(&self, path: &str, content: &str) -> Result<bool, VaultError>;

    fn load_notes(&self) -> Result<Vec<Note>, VaultError> {
        self.list_note_paths()?.iter().map(|path| self.load_note(path)).collect()
    }
}

/// [`Vault`] over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSystemVault {
    walker: VaultWalker,
}

impl FileSystemVault {
    /// Open the vault at `root`. Fails if the root is not an existing directory.
    pub fn new(root: &Path) -> Result<Self, VaultError> {
        Self::with_exclusions(root, Vec::new())
    }

    pub fn with_exclusions(root: &Path, excluded: Vec<PathBuf>) -> Result<Self, VaultError> {
        Ok(Self { walker: VaultWalker::with_exclusions(root, excluded)? })
    }

    /// Validate a caller-supplied path and return it vault-relative.
    ///
    /// Absolute paths are accepted when they live under the root. `..`
    /// components may not climb above the root.
    pub fn normalize_path(&self, path: &str) -> Result<String, VaultError> {
        let invalid = |reason| VaultError::InvalidPath { path: path.to_string(), reason };

        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(invalid("path is empty"));
        }

        let raw = Path::new(trimmed);
        let relative = if raw.is_absolute() {
            raw.strip_prefix(self.root())
                .map_err(|_| invalid("path is outside the vault root"))?
        } else {
            raw
        };

        let mut parts: Vec<String> = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(invalid("path escapes the vault root"));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("path is outside the vault root"));
                }
            }
        }

        if parts.is_empty() {
            return Err(invalid("path names the vault root"));
        }
        Ok(parts.join("/"))
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        relative.split('/').fold(self.root().to_path_buf(), |acc, part| acc.join(part))
    }

    fn writable_target(&self, path: &str) -> Result<PathBuf, VaultError> {
        let relative = self.normalize_path(path)?;
        if !walker::is_markdown_file(Path::new(&relative)) {
            return Err(VaultError::InvalidPath {
                path: path.to_string(),
                reason: "notes must have the .md extension",
            });
        }
        if self.walker.skips(Path::new(&relative)) {
            return Err(VaultError::InvalidPath {
                path: path.to_string(),
                reason: "path is hidden or inside an excluded folder",
            });
        }
        let target = self.absolute(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
        }
        Ok(target)
    }
}

impl Vault for FileSystemVault {
    fn root(&self) -> &Path {
        self.walker.root()
    }

    fn list_note_paths(&self) -> Result<Vec<String>, VaultError> {
        Ok(self
            .walker
            .walk()?
            .into_iter()
            .map(|file| {
                file.relative_path
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect())
    }

    fn load_note(&self, path: &str) -> Result<Note, VaultError> {
        let relative = self.normalize_path(path)?;
        let absolute = self.absolute(&relative);

        let metadata = fs::metadata(&absolute).map_err(|e| VaultError::io(&absolute, e))?;
        if metadata.is_dir() {
            return Err(VaultError::InvalidPath {
                path: path.to_string(),
                reason: "path is a directory",
            });
        }

        let content =
            fs::read_to_string(&absolute).map_err(|e| VaultError::io(&absolute, e))?;
        let modified: Option<DateTime<Local>> = metadata.modified().ok().map(Into::into);

        let title = extract_title(&content, Path::new(&relative));
        let (date, date_source) = match extract_date(Path::new(&relative)) {
            Some(date) => (Some(date), DateSource::Filename),
            None => (modified.map(|m| m.date_naive()), DateSource::Modified),
        };

        Ok(Note {
            id: NoteId::new(relative),
            path: absolute,
            title,
            date,
            date_source,
            modified,
            content,
        })
    }

    fn write_note(&self, path: &str, content: &str) -> Result<(), VaultError> {
        let target = self.writable_target(path)?;
        fs::write(&target, content).map_err(|e| VaultError::io(&target, e))
    }

    fn create_note(&self, path: &str, content: &str) -> Result<bool, VaultError> {
        let target = self.writable_target(path)?;
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(VaultError::io(&target, e)),
        };
        file.write_all(content.as_bytes()).map_err(|e| VaultError::io(&target, e))?;
        Ok(true)
    }
}
