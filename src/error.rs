use thiserror::Error;

use crate::store::SourceMode;

/// Errors produced by the tile store.
///
/// All variants are `Clone`: when concurrent requests for the same tile are
/// coalesced onto one in-flight fetch, every waiter receives its own copy of
/// the single underlying result. Label placement rejections are not errors
/// (collisions are routine) and are reported as a plain `bool` instead.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// `get_tile` was called before `init` completed
    #[error("no tile source configured; call TileStore::init first")]
    NoSourceConfigured,

    /// The source locator matches none of the supported forms, or names a
    /// source that cannot be opened
    #[error("unsupported tile source {locator:?}: {reason}")]
    UnsupportedSource { locator: String, reason: String },

    /// An optional backend driver is not present in this build
    #[error("missing optional dependency {dependency}: {hint}")]
    MissingDependency {
        dependency: &'static str,
        hint: String,
    },

    /// A network, database, or file fetch failed. Never retried internally;
    /// retry policy belongs to the caller.
    #[error("failed to fetch tile {z}/{x}/{y}: {reason}")]
    FetchFailed { z: u8, x: u32, y: u32, reason: String },

    /// A source mode was recognized at selection time but has no usable
    /// fetch path in this build (e.g. MBTiles without its driver feature)
    #[error("source mode {mode:?} has no fetch implementation in this build")]
    UnsupportedMode { mode: SourceMode },

    /// The external decoder rejected a payload. Treated like a failed
    /// fetch: no cache entry is created.
    #[error("failed to decode tile {z}/{x}/{y}: {reason}")]
    Decode { z: u8, x: u32, y: u32, reason: String },
}

impl StoreError {
    /// Shorthand for `FetchFailed` with a displayable reason.
    pub(crate) fn fetch(key: crate::store::TileKey, reason: impl std::fmt::Display) -> Self {
        StoreError::FetchFailed {
            z: key.zoom,
            x: key.x,
            y: key.y,
            reason: reason.to_string(),
        }
    }
}
