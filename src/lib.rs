//! # termatlas
//!
//! Tile acquisition, caching, and label collision core for terminal map
//! viewers.
//!
//! A viewer refreshing a bounded viewport at interactive latency needs two
//! things done well: getting map tiles from wherever they live without
//! blocking the render loop, and keeping text labels from drawing over each
//! other. This crate provides exactly those two subsystems; parsing tile
//! geometry, rasterizing onto the character grid, and input handling belong
//! to the viewer.
//!
//! ## Features
//!
//! - **Three tile sources behind one locator**: remote XYZ endpoints over
//!   HTTP, MBTiles databases (optional `mbtiles` feature), and standalone
//!   vector tile files
//! - **Bounded in-memory cache**: FIFO eviction, coalescing of concurrent
//!   fetches for the same tile
//! - **Offline reuse**: fetched payloads persist to the platform cache
//!   directory and short-circuit later network round trips
//! - **Collision-free labels**: an R-tree over the braille label grid
//!   answers placement and hit-testing queries in sub-linear time
//!
//! ## Architecture
//!
//! - [`store`] - Tile store, source modes, fetchers, caching, persistence
//! - [`labels`] - Label placement and point queries for the current frame
//! - [`geo`] - Web Mercator tile math and color decoding
//! - [`config`] - CLI and library configuration types
//! - [`error`] - The store's error taxonomy
//!
//! ## Example
//!
//! ```rust,no_run
//! use termatlas::{LabelPlacer, RawDecoder, Settings, TileStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), termatlas::StoreError> {
//!     let settings = Settings::default();
//!     let store = TileStore::new(&settings, RawDecoder);
//!     store.init("https://tiles.example.test/v3/").await?;
//!
//!     // One render cycle: fetch a tile, place labels over it.
//!     let _tile = store.get_tile(4, 8, 5).await?;
//!
//!     let mut labels: LabelPlacer<u64> = LabelPlacer::new(&settings);
//!     labels.clear();
//!     if labels.write_if_possible("Berlin", 100, 100, 42, None) {
//!         // draw the label
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod labels;
pub mod store;

// Re-export commonly used types
pub use config::{Config, Settings};
pub use error::StoreError;
pub use labels::{LabelPlacer, PlacedLabel, DEFAULT_LABEL_MARGIN};
#[cfg(feature = "mbtiles")]
pub use store::MbtilesMetadata;
pub use store::{
    driver_available, resolve_mode, DiskCache, FileFetcher, HttpFetcher, MbtilesFetcher,
    RawDecoder, SourceMode, StoreStats, TileCache, TileDecoder, TileFetcher, TileKey, TileStore,
    DEFAULT_TILE_CACHE_CAPACITY,
};
