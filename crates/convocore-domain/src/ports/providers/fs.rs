//! Storage I/O port.
//!
//! The seam between the storage locator / conversation parser and the real
//! filesystem, so both can be driven against an in-memory fixture in tests
//! without touching disk.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::Error;

/// One entry returned by [`StorageIo::read_dir_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Full path to the entry.
    pub path: PathBuf,
    /// Whether the entry is a regular file.
    pub is_file: bool,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Metadata needed by the skeleton cache's freshness check and the
/// conversation parser's `mtime`-derived timestamp fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Last-modified time, if the platform reports one.
    pub modified: Option<SystemTime>,
    /// Size in bytes.
    pub len: u64,
}

/// Storage I/O port.
///
/// Implementations talk to the real filesystem in production and an
/// in-memory fixture in tests.
#[async_trait]
pub trait StorageIo: Send + Sync {
    /// Reads an entire file to a `String`, tolerant of the BOM handling
    /// the conversation parser itself applies.
    async fn read_to_string(&self, path: &Path) -> std::result::Result<String, Error>;

    /// Lists the immediate children of a directory.
    async fn read_dir_entries(&self, path: &Path) -> std::result::Result<Vec<DirEntry>, Error>;

    /// Resolves `path` to an absolute, symlink-free form.
    async fn canonicalize_path(&self, path: &Path) -> std::result::Result<PathBuf, Error>;

    /// Returns size and modification time for `path`.
    async fn stat(&self, path: &Path) -> std::result::Result<FileStat, Error>;

    /// Whether `path` exists at all (file or directory).
    async fn exists(&self, path: &Path) -> bool;

    /// Writes `contents` to `path`, creating or truncating it. Used by the
    /// skeleton cache manifest and the indexing sidecar; the conversation
    /// parser and storage locator never call this.
    async fn write_string(&self, path: &Path, contents: &str) -> std::result::Result<(), Error>;

    /// Creates `path` and any missing parent directories.
    async fn create_dir_all(&self, path: &Path) -> std::result::Result<(), Error>;
}
