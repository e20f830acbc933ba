//! Checkpoint store implementations
//!
//! The file layout is one file per endpoint inside the checkpoint directory,
//! named after the endpoint id and holding the cursor as a decimal string.

use crate::error::{Error, Result};
use crate::types::{parse_cursor_str, Cursor, Endpoint};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Durable endpoint → cursor persistence
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the last completed cursor; `None` means start of stream
    async fn load(&self, endpoint: Endpoint) -> Result<Option<Cursor>>;

    /// Persist a completed cursor
    ///
    /// Must be atomic: a crash never leaves a partially written checkpoint.
    async fn save(&self, endpoint: Endpoint, cursor: Cursor) -> Result<()>;

    /// Forget the checkpoint, so the next sweep starts from the beginning
    async fn clear(&self, endpoint: Endpoint) -> Result<()>;
}

// ============================================================================
// File Store
// ============================================================================

/// File-based checkpoint store
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `dir` without touching the filesystem
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Create a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new(dir);
        tokio::fs::create_dir_all(&store.dir)
            .await
            .map_err(|e| Error::CheckpointDir {
                path: store.dir.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(store)
    }

    /// Checkpoint directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint file for an endpoint
    pub fn path_for(&self, endpoint: Endpoint) -> PathBuf {
        self.dir.join(endpoint.id())
    }

    fn temp_path_for(&self, endpoint: Endpoint) -> PathBuf {
        self.dir.join(format!(".{}.tmp", endpoint.id()))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, endpoint: Endpoint) -> Result<Option<Cursor>> {
        let path = self.path_for(endpoint);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(endpoint = %endpoint, "No checkpoint yet");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::checkpoint(
                    endpoint.id(),
                    format!("Failed to read {}: {e}", path.display()),
                ))
            }
        };

        let cursor = parse_cursor_str(&contents).ok_or_else(|| {
            Error::checkpoint(
                endpoint.id(),
                format!("Invalid checkpoint content {:?}", contents.trim()),
            )
        })?;

        info!(endpoint = %endpoint, cursor, "Loaded checkpoint");
        Ok(Some(cursor))
    }

    async fn save(&self, endpoint: Endpoint, cursor: Cursor) -> Result<()> {
        let path = self.path_for(endpoint);
        let temp_path = self.temp_path_for(endpoint);
        let fail = |stage: &str, e: std::io::Error| {
            Error::checkpoint(endpoint.id(), format!("Failed to {stage} checkpoint: {e}"))
        };

        // Write to temp file first, then rename for atomicity
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| fail("create", e))?;
        file.write_all(cursor.to_string().as_bytes())
            .await
            .map_err(|e| fail("write", e))?;
        file.sync_all().await.map_err(|e| fail("sync", e))?;
        drop(file);

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| fail("rename", e))?;

        info!(endpoint = %endpoint, cursor, path = %path.display(), "Saved checkpoint");
        Ok(())
    }

    async fn clear(&self, endpoint: Endpoint) -> Result<()> {
        let path = self.path_for(endpoint);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(endpoint = %endpoint, "Cleared checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(endpoint = %endpoint, "No checkpoint to clear");
                Ok(())
            }
            Err(e) => Err(Error::checkpoint(
                endpoint.id(),
                format!("Failed to remove checkpoint: {e}"),
            )),
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-memory checkpoint store (no persistence across restarts)
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    cursors: RwLock<HashMap<Endpoint, Cursor>>,
    saves: RwLock<Vec<(Endpoint, Cursor)>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing checkpoints
    pub fn with_cursors(cursors: impl IntoIterator<Item = (Endpoint, Cursor)>) -> Self {
        Self {
            cursors: RwLock::new(cursors.into_iter().collect()),
            saves: RwLock::default(),
        }
    }

    /// Every save performed so far, in order
    pub async fn saves(&self) -> Vec<(Endpoint, Cursor)> {
        self.saves.read().await.clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, endpoint: Endpoint) -> Result<Option<Cursor>> {
        Ok(self.cursors.read().await.get(&endpoint).copied())
    }

    async fn save(&self, endpoint: Endpoint, cursor: Cursor) -> Result<()> {
        self.cursors.write().await.insert(endpoint, cursor);
        self.saves.write().await.push((endpoint, cursor));
        Ok(())
    }

    async fn clear(&self, endpoint: Endpoint) -> Result<()> {
        self.cursors.write().await.remove(&endpoint);
        Ok(())
    }
}
