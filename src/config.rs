//! Configuration for termatlas.
//!
//! Two layers:
//!
//! - [`Config`] - the CLI/environment surface parsed by clap. Every option
//!   can also be set via a `TERMATLAS_`-prefixed environment variable.
//! - [`Settings`] - the subset the library consumes, read once and passed
//!   by reference into [`TileStore`](crate::store::TileStore) and
//!   [`LabelPlacer`](crate::labels::LabelPlacer) constructors. There is no
//!   process-wide mutable configuration; mutating a `Settings` after
//!   construction is not observed by components built from it.
//!
//! # Environment Variables
//!
//! - `TERMATLAS_SOURCE` - Tile source locator
//! - `TERMATLAS_PERSIST` - Persist fetched tiles to disk (default: true)
//! - `TERMATLAS_CACHE_DIR` - Override the persistence directory
//! - `TERMATLAS_CACHE_CAPACITY` - In-memory tile cache entries (default: 16)
//! - `TERMATLAS_LABEL_MARGIN` - Label clearance in grid cells (default: 5)

use std::path::PathBuf;

use clap::Parser;

use crate::labels::DEFAULT_LABEL_MARGIN;
use crate::store::DEFAULT_TILE_CACHE_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default zoom level for the warm command.
pub const DEFAULT_ZOOM: u8 = 0;

/// Default warm radius in tiles around the center tile.
pub const DEFAULT_RADIUS: u32 = 1;

/// Largest zoom level the CLI accepts.
pub const MAX_ZOOM: u8 = 22;

/// Largest warm radius the CLI accepts.
pub const MAX_RADIUS: u32 = 8;

/// Web Mercator latitude cutoff.
pub const MAX_LATITUDE: f64 = 85.0511;

// =============================================================================
// Library Settings
// =============================================================================

/// Settings consumed by the store and the label placer.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Persist fetched HTTP payloads to disk
    pub persist_downloads: bool,

    /// Persistence root; `None` selects the platform cache directory
    pub cache_root: Option<PathBuf>,

    /// In-memory tile cache capacity, in entries
    pub tile_cache_capacity: usize,

    /// Default label clearance, in grid cells
    pub label_margin: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persist_downloads: true,
            cache_root: None,
            tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
            label_margin: DEFAULT_LABEL_MARGIN,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// termatlas - warm and inspect tile sources for terminal map viewers.
///
/// Resolves a tile source (HTTP endpoint, MBTiles database, or standalone
/// vector tile), fetches the tiles covering an area, and reports cache and
/// persistence behavior. The same store and settings drive the interactive
/// viewer.
#[derive(Parser, Debug, Clone)]
#[command(name = "termatlas")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Tile source locator: an http(s) endpoint, an .mbtiles file, or a
    /// standalone .pbf/.mvt tile.
    #[arg(env = "TERMATLAS_SOURCE")]
    pub source: String,

    // =========================================================================
    // Store Configuration
    // =========================================================================
    /// Persist fetched tiles to disk for offline reuse.
    #[arg(long, default_value_t = true, env = "TERMATLAS_PERSIST")]
    pub persist_downloads: bool,

    /// Directory for persisted tiles. Defaults to the platform cache
    /// directory.
    #[arg(long, env = "TERMATLAS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Number of decoded tiles to keep in memory.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "TERMATLAS_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    // =========================================================================
    // Label Configuration
    // =========================================================================
    /// Label clearance in grid cells.
    #[arg(long, default_value_t = DEFAULT_LABEL_MARGIN, env = "TERMATLAS_LABEL_MARGIN")]
    pub label_margin: u16,

    // =========================================================================
    // Warm Area
    // =========================================================================
    /// Zoom level to fetch.
    #[arg(short, long, default_value_t = DEFAULT_ZOOM)]
    pub zoom: u8,

    /// Latitude of the area center.
    #[arg(long, default_value_t = 0.0)]
    pub lat: f64,

    /// Longitude of the area center.
    #[arg(long, default_value_t = 0.0)]
    pub lon: f64,

    /// Tiles to fetch in each direction around the center tile.
    #[arg(short, long, default_value_t = DEFAULT_RADIUS)]
    pub radius: u32,

    // =========================================================================
    // Output
    // =========================================================================
    /// Emit the report as JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.is_empty() {
            return Err(
                "tile source is required. Pass a locator or set TERMATLAS_SOURCE".to_string(),
            );
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }

        if self.zoom > MAX_ZOOM {
            return Err(format!("zoom must be at most {MAX_ZOOM}"));
        }

        if self.radius > MAX_RADIUS {
            return Err(format!(
                "radius must be at most {MAX_RADIUS} ({} tiles per fetch)",
                (2 * MAX_RADIUS + 1) * (2 * MAX_RADIUS + 1)
            ));
        }

        if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.lat) {
            return Err(format!("lat must be within ±{MAX_LATITUDE}"));
        }

        if !(-180.0..=180.0).contains(&self.lon) {
            return Err("lon must be within ±180".to_string());
        }

        Ok(())
    }

    /// The library-facing settings, read once.
    pub fn settings(&self) -> Settings {
        Settings {
            persist_downloads: self.persist_downloads,
            cache_root: self.cache_dir.clone(),
            tile_cache_capacity: self.cache_capacity,
            label_margin: self.label_margin,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
