//! Audio file storage.

use super::error::MediaError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Where synthesized audio is kept, keyed by filename.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn contains(&self, filename: &str) -> Result<bool, MediaError>;

    /// Store `data` under `filename`, replacing any previous content.
    async fn write(&self, filename: &str, data: &[u8]) -> Result<(), MediaError>;
}

/// Plain filenames only: no separators, no parent references.
fn check_name(filename: &str) -> Result<(), MediaError> {
    let bad = filename.trim().is_empty()
        || filename.contains(['/', '\\'])
        || filename == "."
        || filename == ".."
        || filename.chars().any(char::is_control);
    if bad {
        return Err(MediaError::InvalidName {
            filename: filename.to_string(),
        });
    }
    Ok(())
}

/// Media files in a directory on disk.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, MediaError> {
        check_name(filename)?;
        Ok(self.root.join(filename))
    }
}

fn io_error(filename: &str, e: std::io::Error) -> MediaError {
    MediaError::Io {
        filename: filename.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn contains(&self, filename: &str) -> Result<bool, MediaError> {
        let path = self.path_for(filename)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(filename, e))
    }

    async fn write(&self, filename: &str, data: &[u8]) -> Result<(), MediaError> {
        let path = self.path_for(filename)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(filename, e))?;

        // Readers never see a partial file.
        let tmp = self.root.join(format!(".{filename}.partial"));
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| io_error(filename, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(filename, e));
        }

        tracing::debug!(path = %path.display(), bytes = data.len(), "Media file written");
        Ok(())
    }
}

/// Media kept in memory, counting writes.
#[derive(Debug, Default)]
pub struct InMemoryMediaStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, filename: &str) -> Option<Vec<u8>> {
        self.files.lock().await.get(filename).cloned()
    }

    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn contains(&self, filename: &str) -> Result<bool, MediaError> {
        check_name(filename)?;
        Ok(self.files.lock().await.contains_key(filename))
    }

    async fn write(&self, filename: &str, data: &[u8]) -> Result<(), MediaError> {
        check_name(filename)?;
        self.files
            .lock()
            .await
            .insert(filename.to_string(), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
