//! Backend fetchers for raw tile payloads.
//!
//! A [`TileFetcher`] resolves one tile key to its raw payload bytes. The
//! store picks exactly one fetcher at init time from the source locator and
//! keeps it for the session:
//!
//! - [`HttpFetcher`] - GET `{locator}{z}/{x}/{y}.pbf`, with an optional
//!   read-through disk cache in front of the network
//! - [`FileFetcher`] - a standalone vector tile file served for every key
//! - `MbtilesFetcher` (in [`super::mbtiles`]) - blob lookups in an MBTiles
//!   database, behind the optional `mbtiles` feature
//!
//! Fetchers never retry: a failed fetch surfaces as
//! [`StoreError::FetchFailed`] and retry policy stays with the caller.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;

use super::cache::TileKey;
use super::persist::DiskCache;
use super::SourceMode;

/// User agent sent with tile requests.
const USER_AGENT: &str = concat!("termatlas/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// TileFetcher Trait
// =============================================================================

/// One backend's way of resolving a tile key to raw payload bytes.
///
/// Implementations suspend only at their I/O boundary (network request,
/// database query, file read) and are safe to share across tasks.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// The source mode this fetcher serves.
    fn mode(&self) -> SourceMode;

    /// Fetch the raw, undecoded payload for `key`.
    async fn fetch(&self, key: TileKey) -> Result<Bytes, StoreError>;
}

// =============================================================================
// HTTP
// =============================================================================

/// Fetches tiles from a remote XYZ endpoint.
pub struct HttpFetcher {
    /// Endpoint base, normalized to end with `/`
    base: String,

    client: reqwest::Client,

    /// Read-through persistence; `None` when disabled for the session
    persist: Option<Arc<DiskCache>>,
}

impl HttpFetcher {
    /// Create a fetcher for the endpoint at `base`.
    ///
    /// `persist`, when present, is consulted before every network request
    /// and receives every fetched payload.
    pub fn new(base: &str, persist: Option<Arc<DiskCache>>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        Ok(Self {
            base,
            client,
            persist,
        })
    }

    fn url_for(&self, key: TileKey) -> String {
        format!("{}{}/{}/{}.pbf", self.base, key.zoom, key.x, key.y)
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    fn mode(&self) -> SourceMode {
        SourceMode::Http
    }

    async fn fetch(&self, key: TileKey) -> Result<Bytes, StoreError> {
        if let Some(disk) = &self.persist {
            if let Some(payload) = disk.read(key).await {
                debug!("tile {} served from disk cache", key);
                return Ok(payload);
            }
        }

        let url = self.url_for(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoreError::fetch(key, e))?;
        let payload = response
            .bytes()
            .await
            .map_err(|e| StoreError::fetch(key, e))?;

        debug!("fetched {} ({} bytes) from {}", key, payload.len(), url);

        if let Some(disk) = &self.persist {
            disk.write_detached(key, payload.clone());
        }

        Ok(payload)
    }
}

// =============================================================================
// Standalone File
// =============================================================================

/// Serves a single standalone vector tile file.
///
/// The file holds one pre-cut tile, so the same payload answers every
/// requested key; the viewport controller positions it.
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TileFetcher for FileFetcher {
    fn mode(&self) -> SourceMode {
        SourceMode::VectorTile
    }

    async fn fetch(&self, key: TileKey) -> Result<Bytes, StoreError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| StoreError::fetch(key, format!("{}: {}", self.path.display(), e)))?;
        Ok(Bytes::from(bytes))
    }
}

// =============================================================================
// Tests
// =============================================================================
