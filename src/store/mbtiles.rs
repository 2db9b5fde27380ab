//! MBTiles database lookups.
//!
//! MBTiles bundles a whole tile pyramid into one SQLite file with a `tiles`
//! table keyed by `(zoom_level, tile_column, tile_row)`. Rows are stored in
//! TMS order (row 0 at the south edge), so lookups flip the XYZ row before
//! querying.
//!
//! The SQLite driver is an optional dependency. Builds without the
//! `mbtiles` feature still recognize `.mbtiles` locators at mode selection,
//! but initialization reports [`StoreError::MissingDependency`] with a
//! remediation hint, and the stub fetcher below reports
//! [`StoreError::UnsupportedMode`] if it is ever dispatched to. The
//! capability is probed exactly once, at initialization
//! ([`driver_available`]); no fetch-path code branches on it.

/// Whether this build carries the SQLite driver.
pub fn driver_available() -> bool {
    cfg!(feature = "mbtiles")
}

/// Remediation hint attached to [`StoreError::MissingDependency`].
pub const DRIVER_HINT: &str =
    "rebuild with `--features mbtiles` to include the bundled SQLite driver";

pub use imp::MbtilesFetcher;
#[cfg(feature = "mbtiles")]
pub use imp::MbtilesMetadata;

// =============================================================================
// Driver Present
// =============================================================================

#[cfg(feature = "mbtiles")]
mod imp {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};

    use async_trait::async_trait;
    use bytes::Bytes;
    use rusqlite::{Connection, OpenFlags};

    use crate::error::StoreError;
    use crate::store::cache::TileKey;
    use crate::store::fetch::TileFetcher;
    use crate::store::SourceMode;

    /// Descriptive rows from the `metadata` table.
    #[derive(Debug, Clone, Default)]
    pub struct MbtilesMetadata {
        pub name: Option<String>,
        pub format: Option<String>,
        pub bounds: Option<String>,
        /// The `json` row (vector layer descriptions), parsed when present
        pub json: Option<serde_json::Value>,
    }

    /// Fetches tiles from an open MBTiles database.
    ///
    /// SQLite connections are not `Sync`, so the connection sits behind a
    /// mutex and every query runs on the blocking thread pool.
    #[derive(Debug)]
    pub struct MbtilesFetcher {
        conn: Arc<Mutex<Connection>>,
        path: PathBuf,
    }

    fn lock(conn: &Arc<Mutex<Connection>>) -> MutexGuard<'_, Connection> {
        match conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    impl MbtilesFetcher {
        /// Open the database read-only, off the async path.
        pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
            let open_path = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                Connection::open_with_flags(
                    &open_path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
            })
            .await;

            let conn = match result {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => {
                    return Err(StoreError::UnsupportedSource {
                        locator: path.display().to_string(),
                        reason: format!("unable to open database: {e}"),
                    })
                }
                Err(e) => {
                    return Err(StoreError::UnsupportedSource {
                        locator: path.display().to_string(),
                        reason: format!("database open task failed: {e}"),
                    })
                }
            };

            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
                path,
            })
        }

        /// Path of the underlying database file.
        pub fn path(&self) -> &std::path::Path {
            &self.path
        }

        /// Read the descriptive `metadata` table.
        pub async fn metadata(&self) -> Result<MbtilesMetadata, StoreError> {
            let conn = Arc::clone(&self.conn);
            let rows = tokio::task::spawn_blocking(move || -> rusqlite::Result<Vec<(String, String)>> {
                let conn = lock(&conn);
                let mut stmt = conn.prepare("SELECT name, value FROM metadata")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| StoreError::UnsupportedSource {
                locator: self.path.display().to_string(),
                reason: format!("metadata query task failed: {e}"),
            })?
            .map_err(|e| StoreError::UnsupportedSource {
                locator: self.path.display().to_string(),
                reason: format!("unable to read metadata: {e}"),
            })?;

            let mut metadata = MbtilesMetadata::default();
            for (name, value) in rows {
                match name.as_str() {
                    "name" => metadata.name = Some(value),
                    "format" => metadata.format = Some(value),
                    "bounds" => metadata.bounds = Some(value),
                    "json" => metadata.json = serde_json::from_str(&value).ok(),
                    _ => {}
                }
            }
            Ok(metadata)
        }
    }

    #[async_trait]
    impl TileFetcher for MbtilesFetcher {
        fn mode(&self) -> SourceMode {
            SourceMode::Mbtiles
        }

        async fn fetch(&self, key: TileKey) -> Result<Bytes, StoreError> {
            if !key.is_valid() {
                return Err(StoreError::fetch(key, "coordinates outside the tile grid"));
            }

            // XYZ row → TMS row
            let flipped = (1i64 << key.zoom) - 1 - key.y as i64;

            let conn = Arc::clone(&self.conn);
            let result = tokio::task::spawn_blocking(move || {
                let conn = lock(&conn);
                conn.query_row(
                    "SELECT tile_data FROM tiles \
                     WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
                    rusqlite::params![key.zoom as i64, key.x as i64, flipped],
                    |row| row.get::<_, Vec<u8>>(0),
                )
            })
            .await
            .map_err(|e| StoreError::fetch(key, e))?;

            match result {
                Ok(blob) => Ok(Bytes::from(blob)),
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    Err(StoreError::fetch(key, "tile not present in database"))
                }
                Err(e) => Err(StoreError::fetch(key, e)),
            }
        }
    }

}

// =============================================================================
// Driver Absent
// =============================================================================

#[cfg(not(feature = "mbtiles"))]
mod imp {
    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::error::StoreError;
    use crate::store::cache::TileKey;
    use crate::store::fetch::TileFetcher;
    use crate::store::SourceMode;

    /// Placeholder for builds without the SQLite driver.
    ///
    /// Initialization rejects `.mbtiles` locators with `MissingDependency`
    /// before a fetcher is ever constructed; this stub exists so the
    /// dispatch table stays total, and reports the gap if reached.
    pub struct MbtilesFetcher {
        _private: (),
    }

    impl MbtilesFetcher {
        pub(crate) fn unavailable() -> Self {
            Self { _private: () }
        }
    }

    #[async_trait]
    impl TileFetcher for MbtilesFetcher {
        fn mode(&self) -> SourceMode {
            SourceMode::Mbtiles
        }

        async fn fetch(&self, _key: TileKey) -> Result<Bytes, StoreError> {
            Err(StoreError::UnsupportedMode {
                mode: SourceMode::Mbtiles,
            })
        }
    }

}
