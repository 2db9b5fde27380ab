//! Shared fixtures for integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use termatlas::{Settings, SourceMode, StoreError, TileFetcher, TileKey};

/// Settings with persistence off and a small cache, for deterministic
/// eviction tests.
pub fn test_settings(capacity: usize) -> Settings {
    Settings {
        persist_downloads: false,
        cache_root: None,
        tile_cache_capacity: capacity,
        ..Settings::default()
    }
}

/// Backend that stamps each payload with its key and counts fetches.
pub struct MockFetcher {
    fetches: AtomicU64,
    delay: Duration,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            fetches: AtomicU64::new(0),
            delay: Duration::ZERO,
        }
    }

    /// A fetcher that sleeps before answering, to hold fetches in flight.
    pub fn slow(delay: Duration) -> Self {
        Self {
            fetches: AtomicU64::new(0),
            delay,
        }
    }

    pub fn count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileFetcher for MockFetcher {
    fn mode(&self) -> SourceMode {
        SourceMode::Http
    }

    async fn fetch(&self, key: TileKey) -> Result<Bytes, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Bytes::from(format!("payload:{key}")))
    }
}
