//! Storage I/O adapters.
//!
//! [`TokioStorageIo`] talks to the real filesystem via `tokio::fs`.
//! [`InMemoryStorageIo`] is a synchronous in-memory fixture used by every
//! application-layer unit test instead of touching disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use convocore_domain::error::Error;
use convocore_domain::ports::{DirEntry, FileStat, StorageIo};

/// Strips a leading UTF-8 byte-order mark, if present. Host extensions on
/// Windows sometimes write conversation history with one; `serde_json`
/// rejects it outright, so every [`StorageIo::read_to_string`] adapter
/// strips it before returning.
fn strip_bom(contents: String) -> String {
    contents
        .strip_prefix('\u{feff}')
        .map(str::to_owned)
        .unwrap_or(contents)
}

/// Decodes raw file bytes to text, transparently re-decoding UTF-16
/// (LE or BE, detected by BOM) rather than failing outright — some host
/// extension versions write conversation history as UTF-16 on Windows.
/// Falls back to UTF-8 (stripping its own BOM) when no UTF-16 BOM is found.
fn decode_text_bytes(bytes: &[u8]) -> Result<String, Error> {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units)
            .map_err(|source| Error::io_with_source("invalid utf-16le content", source));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units)
            .map_err(|source| Error::io_with_source("invalid utf-16be content", source));
    }
    let text = String::from_utf8(bytes.to_vec())
        .map_err(|source| Error::io_with_source("invalid utf-8 content", source))?;
    Ok(strip_bom(text))
}

/// Real filesystem adapter, used in production.
#[derive(Debug, Clone, Default)]
pub struct TokioStorageIo;

impl TokioStorageIo {
    /// Builds a new adapter. Holds no state; cheap to construct per call site.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageIo for TokioStorageIo {
    async fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| Error::io_with_source(format!("reading {}", path.display()), source))?;
        decode_text_bytes(&bytes)
    }

    async fn read_dir_entries(&self, path: &Path) -> Result<Vec<DirEntry>, Error> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|source| Error::io_with_source(format!("listing {}", path.display()), source))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|source| Error::io_with_source(format!("listing {}", path.display()), source))?
        {
            let file_type = entry.file_type().await.map_err(|source| {
                Error::io_with_source(format!("stat {}", entry.path().display()), source)
            })?;
            entries.push(DirEntry {
                path: entry.path(),
                is_file: file_type.is_file(),
                is_dir: file_type.is_dir(),
            });
        }
        Ok(entries)
    }

    async fn canonicalize_path(&self, path: &Path) -> Result<PathBuf, Error> {
        tokio::fs::canonicalize(path)
            .await
            .map_err(|source| Error::io_with_source(format!("canonicalizing {}", path.display()), source))
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, Error> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| Error::io_with_source(format!("stat {}", path.display()), source))?;
        Ok(FileStat {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn write_string(&self, path: &Path, contents: &str) -> Result<(), Error> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|source| Error::io_with_source(format!("writing {}", path.display()), source))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), Error> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|source| Error::io_with_source(format!("creating {}", path.display()), source))
    }
}

#[derive(Debug, Clone)]
enum InMemoryNode {
    File { contents: Vec<u8>, modified: SystemTime },
    Dir,
}

/// In-memory fixture adapter for tests. Paths are plain string keys; no
/// normalization beyond what `Path` itself does.
#[derive(Debug, Default)]
pub struct InMemoryStorageIo {
    nodes: Mutex<BTreeMap<PathBuf, InMemoryNode>>,
}

impl InMemoryStorageIo {
    /// Builds an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Seeds a file and every missing ancestor directory. Infallible: test
    /// fixtures have no failure mode worth modeling.
    pub async fn write_file(&self, path: &str, contents: &str) {
        self.write_file_bytes(path, contents.as_bytes().to_vec()).await;
    }

    /// Seeds a file from raw bytes, for fixtures that need a specific
    /// encoding (e.g. a UTF-16 BOM) that a `&str` literal can't express.
    pub async fn write_file_bytes(&self, path: &str, contents: Vec<u8>) {
        let path = PathBuf::from(path);
        self.ensure_parents(&path);
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.insert(
            path,
            InMemoryNode::File {
                contents,
                modified: SystemTime::now(),
            },
        );
    }

    fn ensure_parents(&self, path: &Path) {
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            nodes.entry(dir.to_path_buf()).or_insert(InMemoryNode::Dir);
            ancestor = dir.parent();
        }
    }
}

#[async_trait]
impl StorageIo for InMemoryStorageIo {
    async fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        match nodes.get(path) {
            Some(InMemoryNode::File { contents, .. }) => decode_text_bytes(contents),
            _ => Err(Error::io(format!("no such file: {}", path.display()))),
        }
    }

    async fn read_dir_entries(&self, path: &Path) -> Result<Vec<DirEntry>, Error> {
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        if !nodes.contains_key(path) {
            return Err(Error::io(format!("no such directory: {}", path.display())));
        }
        let mut entries = Vec::new();
        for (candidate, node) in nodes.iter() {
            if candidate.parent() == Some(path) {
                entries.push(DirEntry {
                    path: candidate.clone(),
                    is_file: matches!(node, InMemoryNode::File { .. }),
                    is_dir: matches!(node, InMemoryNode::Dir),
                });
            }
        }
        Ok(entries)
    }

    async fn canonicalize_path(&self, path: &Path) -> Result<PathBuf, Error> {
        Ok(path.to_path_buf())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, Error> {
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        match nodes.get(path) {
            Some(InMemoryNode::File { contents, modified }) => Ok(FileStat {
                modified: Some(*modified),
                len: contents.len() as u64,
            }),
            Some(InMemoryNode::Dir) => Ok(FileStat {
                modified: None,
                len: 0,
            }),
            None => Err(Error::io(format!("no such path: {}", path.display()))),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        self.nodes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }

    async fn write_string(&self, path: &Path, contents: &str) -> Result<(), Error> {
        self.write_file(path.to_string_lossy().as_ref(), contents).await;
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), Error> {
        self.ensure_parents(&path.join("_"));
        self.nodes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.to_path_buf())
            .or_insert(InMemoryNode::Dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_written_file() {
        let storage = InMemoryStorageIo::new();
        storage.write_file("/root/tasks/t/a.json", "{}").await;
        let read = storage.read_to_string(Path::new("/root/tasks/t/a.json")).await;
        assert_eq!(read.expect("file should exist"), "{}");
    }

    #[tokio::test]
    async fn strips_leading_bom() {
        let storage = InMemoryStorageIo::new();
        storage.write_file("/f.json", "\u{feff}{}").await;
        let read = storage.read_to_string(Path::new("/f.json")).await.unwrap();
        assert_eq!(read, "{}");
    }

    #[tokio::test]
    async fn transparently_redecodes_utf16le() {
        let storage = InMemoryStorageIo::new();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "{}".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        storage.write_file_bytes("/f.json", bytes).await;
        let read = storage.read_to_string(Path::new("/f.json")).await.unwrap();
        assert_eq!(read, "{}");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let storage = InMemoryStorageIo::new();
        let result = storage.read_to_string(Path::new("/missing")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn lists_immediate_children_only() {
        let storage = InMemoryStorageIo::new();
        storage.write_file("/root/tasks/t/a.json", "{}").await;
        storage.write_file("/root/tasks/t/nested/b.json", "{}").await;
        let entries = storage
            .read_dir_entries(Path::new("/root/tasks/t"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }
}
