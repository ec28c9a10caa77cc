//! Key/value storage for serialized boards

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// String blobs addressed by key.
///
/// A missing key reads as `Ok(None)`. Errors mean the storage itself is
/// unusable (permissions, quota, I/O).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, key: &str) -> io::Result<Option<String>>;

    async fn write(&self, key: &str, contents: &str) -> io::Result<()>;
}

/// One `{key}.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> io::Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob key: {key:?}"),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read(&self, key: &str) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)?).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write through a fresh temporary file so readers never see a partial
    /// blob and concurrent writers never share one
    async fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        let path = self.path(key)?;
        let dir = self.dir.clone();
        let contents = contents.to_string();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// In-process blobs with an optional size quota
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes larger than `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Store a blob directly, bypassing the quota
    pub fn insert(&self, key: impl Into<String>, contents: impl Into<String>) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), contents.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        if let Some(quota) = self.quota {
            if contents.len() > quota {
                return Err(io::Error::new(
                    io::ErrorKind::StorageFull,
                    format!("blob of {} bytes exceeds quota of {quota}", contents.len()),
                ));
            }
        }
        self.insert(key, contents);
        Ok(())
    }
}
