//! File storage boundary.
//!
//! The resolver never touches the filesystem directly; it talks to a
//! [`FileStore`], which reports what kind of entry a path is and reads file
//! content. [`Vault`] is the filesystem-backed implementation.

use crate::error::{ProjectError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Stat metadata for a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Modification time in epoch milliseconds.
    pub mtime_ms: i64,
    /// File size in bytes.
    pub size: u64,
}

/// What a path points at inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    File(FileStat),
    Folder,
}

/// Read-only file storage handle.
///
/// Paths are relative to the store root and use forward slashes.
pub trait FileStore {
    /// Look up a path. `None` means the path does not exist.
    fn entry(&self, path: &Path) -> Option<Entry>;

    /// Read a file's content.
    fn read(&self, path: &Path) -> Result<String>;

    /// Stat a path, returning `Some` only for files.
    fn file_stat(&self, path: &Path) -> Option<FileStat> {
        match self.entry(path)? {
            Entry::File(stat) => Some(stat),
            Entry::Folder => None,
        }
    }
}

/// Filesystem-backed file store rooted at a vault directory.
#[derive(Debug, Clone)]
pub struct Vault {
    /// Root path of the vault.
    pub root: PathBuf,
}

impl Vault {
    /// Create a new vault instance.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.is_dir() {
            return Err(ProjectError::Store(format!(
                "vault root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Get the full path for a vault-relative path.
    pub fn full_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

impl FileStore for Vault {
    fn entry(&self, path: &Path) -> Option<Entry> {
        let full = self.full_path(path);
        let meta = std::fs::metadata(&full).ok()?;

        if meta.is_dir() {
            return Some(Entry::Folder);
        }

        let mtime_ms = meta
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Some(Entry::File(FileStat {
            mtime_ms,
            size: meta.len(),
        }))
    }

    fn read(&self, path: &Path) -> Result<String> {
        let full = self.full_path(path);
        if !full.is_file() {
            return Err(ProjectError::FileNotFound(path.to_path_buf()));
        }
        Ok(std::fs::read_to_string(&full)?)
    }
}
