//! End-to-end tile store behavior.

use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use termatlas::{
    DiskCache, RawDecoder, Settings, SourceMode, StoreError, TileFetcher, TileKey, TileStore,
};

use super::test_utils::{test_settings, MockFetcher};

// =============================================================================
// Mode Selection
// =============================================================================

#[tokio::test]
async fn test_http_locator_selects_http_mode() {
    let store = TileStore::new(&test_settings(16), RawDecoder);
    let mode = store.init("http://example.test/").await.unwrap();
    assert_eq!(mode, SourceMode::Http);
    assert_eq!(store.mode().await, Some(SourceMode::Http));
}

#[tokio::test]
async fn test_unrecognized_locator_is_rejected() {
    let store = TileStore::new(&test_settings(16), RawDecoder);
    let err = store.init("foo.txt").await.unwrap_err();
    match err {
        StoreError::UnsupportedSource { locator, .. } => assert_eq!(locator, "foo.txt"),
        e => panic!("expected UnsupportedSource, got {e:?}"),
    }
    assert_eq!(store.mode().await, None);
}

#[cfg(feature = "mbtiles")]
#[tokio::test]
async fn test_mbtiles_locator_selects_mbtiles_mode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.mbtiles");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (name TEXT, value TEXT);
             CREATE TABLE tiles (
                 zoom_level INTEGER, tile_column INTEGER,
                 tile_row INTEGER, tile_data BLOB
             );",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tiles VALUES (3, 1, 5, ?1)",
            rusqlite::params![b"db tile".to_vec()],
        )
        .unwrap();
    }

    let store = TileStore::new(&test_settings(16), RawDecoder);
    let mode = store.init(path.to_str().unwrap()).await.unwrap();
    assert_eq!(mode, SourceMode::Mbtiles);

    // XYZ row 2 at zoom 3 is TMS row 5.
    let tile = store.get_tile(3, 1, 2).await.unwrap();
    assert_eq!(tile.as_ref(), &Bytes::from_static(b"db tile"));

    let err = store.get_tile(3, 0, 0).await.unwrap_err();
    assert!(matches!(err, StoreError::FetchFailed { .. }));
}

#[cfg(not(feature = "mbtiles"))]
#[tokio::test]
async fn test_mbtiles_locator_without_driver() {
    let store = TileStore::new(&test_settings(16), RawDecoder);
    let err = store.init("berlin.mbtiles").await.unwrap_err();
    match err {
        StoreError::MissingDependency { dependency, hint } => {
            assert_eq!(dependency, "sqlite");
            assert!(hint.contains("mbtiles"), "hint should name the feature: {hint}");
        }
        e => panic!("expected MissingDependency, got {e:?}"),
    }
}

#[tokio::test]
async fn test_standalone_tile_locator() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("island.mvt");
    std::fs::write(&path, b"standalone").unwrap();

    let store = TileStore::new(&test_settings(16), RawDecoder);
    let mode = store.init(path.to_str().unwrap()).await.unwrap();
    assert_eq!(mode, SourceMode::VectorTile);

    // The single payload answers any key.
    let a = store.get_tile(0, 0, 0).await.unwrap();
    let b = store.get_tile(6, 33, 21).await.unwrap();
    assert_eq!(a.as_ref(), b.as_ref());
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_second_request_hits_cache() {
    let fetcher = Arc::new(MockFetcher::new());
    let store = TileStore::new(&test_settings(16), RawDecoder);
    store
        .init_with_fetcher(fetcher.clone() as Arc<dyn TileFetcher>)
        .await;

    let first = store.get_tile(5, 10, 11).await.unwrap();
    let second = store.get_tile(5, 10, 11).await.unwrap();

    // Same tile identity, one underlying fetch.
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fetcher.count(), 1);
}

#[tokio::test]
async fn test_strict_fifo_eviction() {
    let fetcher = Arc::new(MockFetcher::new());
    let store = TileStore::new(&test_settings(3), RawDecoder);
    store
        .init_with_fetcher(fetcher.clone() as Arc<dyn TileFetcher>)
        .await;

    // Eight distinct keys through a 3-entry cache.
    for x in 0..8u32 {
        store.get_tile(10, x, 0).await.unwrap();
    }
    assert_eq!(store.stats().await.entries, 3);

    // The newest three hit without fetching...
    let before = fetcher.count();
    for x in 5..8u32 {
        store.get_tile(10, x, 0).await.unwrap();
    }
    assert_eq!(fetcher.count(), before);

    // ...and the oldest five were evicted.
    store.get_tile(10, 0, 0).await.unwrap();
    assert_eq!(fetcher.count(), before + 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let fetcher = Arc::new(MockFetcher::slow(std::time::Duration::from_millis(50)));
    let store = Arc::new(TileStore::new(&test_settings(16), RawDecoder));
    store
        .init_with_fetcher(fetcher.clone() as Arc<dyn TileFetcher>)
        .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.get_tile(7, 3, 3).await }));
    }

    let mut tiles = Vec::new();
    for handle in handles {
        tiles.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(fetcher.count(), 1);
    for tile in &tiles {
        assert!(Arc::ptr_eq(tile, &tiles[0]));
    }
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_persisted_tile_round_trip_offline() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("tiles");
    let payload = Bytes::from_static(b"persisted payload");

    // Seed the disk cache the way a previous session's fetch would have.
    let disk = DiskCache::open(root.clone()).unwrap();
    disk.write(TileKey::new(3, 1, 2), &payload).await.unwrap();

    // A fresh store pointed at an unreachable endpoint must still serve
    // the persisted tile.
    let settings = Settings {
        persist_downloads: true,
        cache_root: Some(root),
        ..Settings::default()
    };
    let store = TileStore::new(&settings, RawDecoder);
    store.init("http://127.0.0.1:9/").await.unwrap();

    let tile = store.get_tile(3, 1, 2).await.unwrap();
    assert_eq!(tile.as_ref(), &payload);

    // A key that was never persisted still needs the network, and fails.
    let err = store.get_tile(3, 2, 2).await.unwrap_err();
    assert!(matches!(err, StoreError::FetchFailed { .. }));
}

#[tokio::test]
async fn test_persistence_layout_on_disk() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("tiles");

    let disk = DiskCache::open(root.clone()).unwrap();
    disk.write(TileKey::new(12, 1234, 5678), &Bytes::from_static(b"x"))
        .await
        .unwrap();

    assert!(root.join("12").join("1234-5678.pbf").is_file());
}

#[tokio::test]
async fn test_reinit_preserves_persisted_tiles() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("tiles");
    let payload = Bytes::from_static(b"survives reinit");

    let disk = DiskCache::open(root.clone()).unwrap();
    disk.write(TileKey::new(2, 1, 1), &payload).await.unwrap();

    let settings = Settings {
        persist_downloads: true,
        cache_root: Some(root),
        ..Settings::default()
    };
    let store = TileStore::new(&settings, RawDecoder);

    // Re-initialization clears the in-memory cache but not the disk.
    store.init("http://127.0.0.1:9/").await.unwrap();
    assert_eq!(
        store.get_tile(2, 1, 1).await.unwrap().as_ref(),
        &payload
    );
    store.init("http://127.0.0.1:9/").await.unwrap();
    assert_eq!(store.stats().await.entries, 0);
    assert_eq!(
        store.get_tile(2, 1, 1).await.unwrap().as_ref(),
        &payload
    );
}
