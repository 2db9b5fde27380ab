//! On-disk persistence of raw tile payloads.
//!
//! Payloads are stored exactly as fetched (pre-decoding) under one
//! subdirectory per zoom level:
//!
//! ```text
//! {root}/{zoom}/{x}-{y}.pbf
//! ```
//!
//! The layout is append-only: a payload is written once per key and never
//! rewritten. Reads are best-effort: a missing or unreadable file is a
//! cache miss, not an error. Directory creation may race with other
//! processes sharing the same root; an already-existing directory counts as
//! success.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::cache::TileKey;

/// File extension for persisted payloads.
const PAYLOAD_EXTENSION: &str = "pbf";

/// Persistent store for raw tile payloads.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// The platform-appropriate per-application cache root, if the platform
    /// exposes one.
    pub fn default_root() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("termatlas").join("tiles"))
    }

    /// Open a disk cache rooted at `root`, creating the directory if needed.
    ///
    /// An already-existing root (including one created concurrently by
    /// another process) is success. Any other creation failure is returned;
    /// the caller decides whether that disables persistence or aborts.
    pub fn open(root: PathBuf) -> io::Result<Self> {
        match std::fs::create_dir_all(&root) {
            Ok(()) => Ok(Self { root }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(Self { root }),
            Err(e) => Err(e),
        }
    }

    /// Path a payload for `key` is stored at.
    pub fn path_for(&self, key: TileKey) -> PathBuf {
        self.root
            .join(key.zoom.to_string())
            .join(format!("{}-{}.{}", key.x, key.y, PAYLOAD_EXTENSION))
    }

    /// Read a persisted payload. Any failure resolves to `None`.
    pub async fn read(&self, key: TileKey) -> Option<Bytes> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!("unreadable persisted tile {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write a payload for `key`, creating the zoom subdirectory if needed.
    ///
    /// A payload already on disk is left untouched.
    pub async fn write(&self, key: TileKey, payload: &Bytes) -> io::Result<()> {
        let path = self.path_for(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, payload).await
    }

    /// Persist a payload in the background.
    ///
    /// Used on the fetch path: a disk-write failure must not fail the fetch
    /// that triggered it, so the write is detached and failures are only
    /// logged.
    pub fn write_detached(self: &Arc<Self>, key: TileKey, payload: Bytes) {
        let disk = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = disk.write(key, &payload).await {
                warn!("failed to persist tile {}: {}", key, e);
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
