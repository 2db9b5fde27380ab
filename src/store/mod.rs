//! Tile acquisition and caching.
//!
//! The store is the single entry point for map data. It resolves one source
//! locator into a backend mode, fetches raw payloads on demand, hands them
//! to the external decoder, and keeps the decoded tiles in a bounded
//! in-memory cache that survives across render cycles.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  TileStore                   │
//! │  ┌────────────────────────────────────────┐  │
//! │  │              get_tile()                │  │
//! │  │  1. Check cache    3. Fetch payload    │  │
//! │  │  2. Coalesce       4. Decode & cache   │  │
//! │  └────────────────────────────────────────┘  │
//! │        │               │              │      │
//! │        ▼               ▼              ▼      │
//! │  ┌───────────┐  ┌─────────────┐  ┌────────┐  │
//! │  │ TileCache │  │ TileFetcher │  │ Tile   │  │
//! │  │ (FIFO)    │  │ http/mbtiles│  │ Decoder│  │
//! │  │           │  │ /file       │  │ (ext.) │  │
//! │  └───────────┘  └──────┬──────┘  └────────┘  │
//! └────────────────────────┼─────────────────────┘
//!                          ▼
//!                   ┌─────────────┐
//!                   │  DiskCache  │  (HTTP mode only)
//!                   └─────────────┘
//! ```
//!
//! # Concurrency
//!
//! One logical task owns the store; several tile requests may be in flight
//! at once (a viewport refresh requests every visible tile). Requests for
//! the same key are coalesced onto a single underlying fetch and every
//! waiter observes the same result. The cache map, the insertion-order
//! sequence, and the in-flight table sit behind async locks, so mutations
//! stay serialized even on a multi-threaded runtime.

mod cache;
mod fetch;
mod mbtiles;
mod persist;

pub use cache::{TileCache, TileKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use fetch::{FileFetcher, HttpFetcher, TileFetcher};
pub use mbtiles::{driver_available, MbtilesFetcher, DRIVER_HINT};
#[cfg(feature = "mbtiles")]
pub use mbtiles::MbtilesMetadata;
pub use persist::DiskCache;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::StoreError;

// =============================================================================
// Source Mode
// =============================================================================

/// The backend a source locator resolves to.
///
/// Selection happens once, at [`TileStore::init`], and is fixed for the
/// session. The set is closed: resolution and dispatch both match
/// exhaustively, so a new mode is a compile-time change, not a runtime
/// surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Remote XYZ endpoint (`http://` or `https://`)
    Http,

    /// Combined-tiles SQLite database (`*.mbtiles`)
    Mbtiles,

    /// Standalone vector tile file (`*.pbf`, `*.mvt`)
    VectorTile,
}

/// Resolve a source locator string to its backend mode.
pub fn resolve_mode(locator: &str) -> Result<SourceMode, StoreError> {
    if let Ok(url) = Url::parse(locator) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(SourceMode::Http);
        }
    }

    let lower = locator.to_ascii_lowercase();
    if lower.ends_with(".mbtiles") {
        return Ok(SourceMode::Mbtiles);
    }
    if lower.ends_with(".pbf") || lower.ends_with(".mvt") {
        return Ok(SourceMode::VectorTile);
    }

    Err(StoreError::UnsupportedSource {
        locator: locator.to_string(),
        reason: "expected an http(s) endpoint, an .mbtiles database, \
                 or a standalone .pbf/.mvt tile"
            .to_string(),
    })
}

// =============================================================================
// Decoder Seam
// =============================================================================

/// External collaborator that turns raw payload bytes into render-ready
/// tiles.
///
/// The payload's internal schema (vector layers, features, geometry
/// commands) is entirely the decoder's business; the store treats both the
/// payload and the decoded tile as opaque. Implementations that style their
/// output are constructed with the style handle, so every decoded tile
/// observes it.
pub trait TileDecoder: Send + Sync + 'static {
    /// The decoded, render-ready tile type.
    type Tile: Send + Sync + 'static;

    /// Decode one payload. Rejections surface as [`StoreError::Decode`]
    /// and leave no cache entry.
    fn decode(
        &self,
        key: TileKey,
        payload: Bytes,
    ) -> Result<Self::Tile, Box<dyn std::error::Error + Send + Sync>>;
}

/// Decoder that hands the payload through unchanged.
///
/// For tools that move or persist tiles without interpreting them: the
/// cache warmer binary, tests, proxies.
pub struct RawDecoder;

impl TileDecoder for RawDecoder {
    type Tile = Bytes;

    fn decode(
        &self,
        _key: TileKey,
        payload: Bytes,
    ) -> Result<Bytes, Box<dyn std::error::Error + Send + Sync>> {
        Ok(payload)
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Counters exposed for diagnostics and the cache warmer's report.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Tiles currently resident in memory
    pub entries: usize,

    /// Maximum resident tiles
    pub capacity: usize,

    /// Requests answered from memory without I/O
    pub hits: u64,

    /// Requests that went to the backend
    pub misses: u64,

    /// Requests coalesced onto an already-running fetch
    pub coalesced: u64,
}

// =============================================================================
// Tile Store
// =============================================================================

/// A fetch for one key, shared by every request that arrives while it runs.
struct InFlight<T> {
    notify: Notify,
    result: Mutex<Option<Result<Arc<T>, StoreError>>>,
}

struct Session {
    mode: SourceMode,
    fetcher: Arc<dyn TileFetcher>,
}

/// Tile acquisition, caching, and persistence behind one locator.
///
/// Generic over the external [`TileDecoder`]; the store owns its cache
/// entries and its on-disk layout exclusively.
pub struct TileStore<D: TileDecoder> {
    decoder: D,

    /// Resolved backend; `None` until [`TileStore::init`] completes
    session: RwLock<Option<Session>>,

    cache: Mutex<TileCache<D::Tile>>,
    in_flight: Mutex<HashMap<TileKey, Arc<InFlight<D::Tile>>>>,

    persist_downloads: bool,
    cache_root: Option<PathBuf>,

    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl<D: TileDecoder> TileStore<D> {
    /// Create an unconfigured store.
    ///
    /// Settings are read once here; later changes to the source struct are
    /// not observed. [`TileStore::get_tile`] reports `NoSourceConfigured`
    /// until [`TileStore::init`] completes.
    pub fn new(settings: &Settings, decoder: D) -> Self {
        Self {
            decoder,
            session: RwLock::new(None),
            cache: Mutex::new(TileCache::new(settings.tile_cache_capacity)),
            in_flight: Mutex::new(HashMap::new()),
            persist_downloads: settings.persist_downloads,
            cache_root: settings.cache_root.clone(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Resolve `locator` to a backend and make the store ready.
    ///
    /// Calling `init` again re-resolves the locator and resets the cache
    /// map, the insertion-order sequence, the in-flight table, and the
    /// session handle, so re-initialization is idempotent. The reset
    /// happens up front: a failed re-init leaves the store unconfigured,
    /// not serving the previous source. Initialization failures are fatal
    /// to the session and are never swallowed.
    pub async fn init(&self, locator: &str) -> Result<SourceMode, StoreError> {
        self.reset().await;

        let mode = resolve_mode(locator)?;

        let fetcher: Arc<dyn TileFetcher> = match mode {
            SourceMode::Http => {
                let persist = self.open_persistence();
                let fetcher =
                    HttpFetcher::new(locator, persist).map_err(|e| StoreError::MissingDependency {
                        dependency: "tls",
                        hint: format!("failed to initialize the HTTP client: {e}"),
                    })?;
                Arc::new(fetcher)
            }
            SourceMode::Mbtiles => {
                if !driver_available() {
                    return Err(StoreError::MissingDependency {
                        dependency: "sqlite",
                        hint: DRIVER_HINT.to_string(),
                    });
                }
                #[cfg(feature = "mbtiles")]
                let fetcher: Arc<dyn TileFetcher> =
                    Arc::new(MbtilesFetcher::open(PathBuf::from(locator)).await?);
                #[cfg(not(feature = "mbtiles"))]
                let fetcher: Arc<dyn TileFetcher> = Arc::new(MbtilesFetcher::unavailable());
                fetcher
            }
            SourceMode::VectorTile => Arc::new(FileFetcher::new(locator)),
        };

        info!("tile source {:?} resolved to {:?} mode", locator, mode);
        *self.session.write().await = Some(Session { mode, fetcher });
        Ok(mode)
    }

    /// Install a caller-provided backend instead of resolving a locator.
    ///
    /// The usual entry point is [`TileStore::init`]; this exists for custom
    /// backends and tests. Resets the same state `init` does.
    pub async fn init_with_fetcher(&self, fetcher: Arc<dyn TileFetcher>) {
        self.reset().await;
        let mode = fetcher.mode();
        *self.session.write().await = Some(Session { mode, fetcher });
    }

    async fn reset(&self) {
        let mut slot = self.session.write().await;
        self.cache.lock().await.clear();
        self.in_flight.lock().await.clear();
        *slot = None;
    }

    /// Create the persistence directory, downgrading failure to a warning.
    ///
    /// A root that already exists (or is created concurrently by another
    /// process sharing it) is fine; any other failure disables persistence
    /// for the session rather than failing initialization.
    fn open_persistence(&self) -> Option<Arc<DiskCache>> {
        if !self.persist_downloads {
            return None;
        }
        let root = match self.cache_root.clone().or_else(DiskCache::default_root) {
            Some(root) => root,
            None => {
                warn!("no cache directory available; tile persistence disabled");
                return None;
            }
        };
        match DiskCache::open(root.clone()) {
            Ok(disk) => Some(Arc::new(disk)),
            Err(e) => {
                warn!(
                    "unable to create tile cache directory {}: {}; persistence disabled",
                    root.display(),
                    e
                );
                None
            }
        }
    }

    /// The active backend mode, if initialized.
    pub async fn mode(&self) -> Option<SourceMode> {
        self.session.read().await.as_ref().map(|s| s.mode)
    }

    /// Get the decoded tile at `(zoom, x, y)`.
    ///
    /// A cache hit returns immediately with no I/O. On a miss, concurrent
    /// requests for the same key share a single underlying fetch; a failed
    /// fetch leaves no cache entry and is not retried here.
    pub async fn get_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Arc<D::Tile>, StoreError> {
        let key = TileKey::new(zoom, x, y);
        if !key.is_valid() {
            return Err(StoreError::fetch(key, "coordinates outside the 2^zoom grid"));
        }

        let fetcher = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| Arc::clone(&s.fetcher))
            .ok_or(StoreError::NoSourceConfigured)?;

        if let Some(tile) = self.cache.lock().await.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(tile);
        }

        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(state) = in_flight.get(&key) {
                    // Another request is already fetching this tile.
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    Arc::clone(state)
                } else {
                    // This request leads the fetch.
                    let state = Arc::new(InFlight {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(key, Arc::clone(&state));
                    drop(in_flight);

                    self.misses.fetch_add(1, Ordering::Relaxed);
                    let result = self.fetch_and_decode(&fetcher, key).await;

                    if let Ok(ref tile) = result {
                        self.cache.lock().await.insert(key, Arc::clone(tile));
                    }
                    *state.result.lock().await = Some(result.clone());

                    self.in_flight.lock().await.remove(&key);
                    state.notify.notify_waiters();

                    return result;
                }
            };

            // Register for the wake-up before checking the result, so a
            // leader finishing in between cannot slip past unnoticed.
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let maybe_result = state.result.lock().await.clone();
            if let Some(result) = maybe_result {
                return result;
            }
            notified.await;

            let maybe_result = state.result.lock().await.clone();
            if let Some(result) = maybe_result {
                return result;
            }
            // Spurious wake-up; rejoin the queue.
        }
    }

    async fn fetch_and_decode(
        &self,
        fetcher: &Arc<dyn TileFetcher>,
        key: TileKey,
    ) -> Result<Arc<D::Tile>, StoreError> {
        let payload = fetcher.fetch(key).await?;
        let tile = self.decoder.decode(key, payload).map_err(|e| StoreError::Decode {
            z: key.zoom,
            x: key.x,
            y: key.y,
            reason: e.to_string(),
        })?;
        Ok(Arc::new(tile))
    }

    /// Current cache occupancy and request counters.
    pub async fn stats(&self) -> StoreStats {
        let cache = self.cache.lock().await;
        StoreStats {
            entries: cache.len(),
            capacity: cache.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
