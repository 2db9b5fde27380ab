//! In-memory tile cache with insertion-order eviction.
//!
//! Decoded tiles are cached by their `(zoom, x, y)` identity. Eviction is
//! strict FIFO: the oldest-inserted entries go first, independent of how
//! often or how recently they were read.
//!
//! # Invariant
//!
//! Every key in the insertion-order sequence has exactly one entry in the
//! key→tile map and vice versa. All mutation goes through [`TileCache`]
//! methods, which maintain both structures together.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default number of decoded tiles kept in memory.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 16;

// =============================================================================
// Tile Key
// =============================================================================

/// The `(zoom, x, y)` identity of a tile.
///
/// Two keys are equal iff all three components are equal. Column and row are
/// bounded by `2^zoom`; [`TileKey::is_valid`] checks the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Zoom level
    pub zoom: u8,

    /// Tile column (0-indexed from the antimeridian)
    pub x: u32,

    /// Tile row (0-indexed from the north, XYZ order)
    pub y: u32,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Whether both coordinates fall inside the `2^zoom` grid.
    ///
    /// Zoom levels past 30 exceed any real tile pyramid and are rejected
    /// outright.
    pub fn is_valid(&self) -> bool {
        if self.zoom > 30 {
            return false;
        }
        let n = 1u64 << self.zoom;
        (self.x as u64) < n && (self.y as u64) < n
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// FIFO cache of decoded tiles.
///
/// Not internally synchronized: the owning store keeps it behind one async
/// lock so that cache updates and in-flight bookkeeping stay serialized
/// (single writer at a time).
pub struct TileCache<T> {
    /// Key → decoded tile
    entries: HashMap<TileKey, Arc<T>>,

    /// Keys in insertion order; front is oldest
    order: VecDeque<TileKey>,

    /// Maximum number of resident entries
    capacity: usize,
}

impl<T> TileCache<T> {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Look up a tile by exact key. Does not touch insertion order.
    pub fn get(&self, key: &TileKey) -> Option<Arc<T>> {
        self.entries.get(key).cloned()
    }

    /// Whether a tile is resident.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a tile, then evict the oldest entries until the cache is back
    /// within capacity.
    ///
    /// Re-inserting an existing key replaces the tile in place and keeps the
    /// key's original position in the eviction order.
    pub fn insert(&mut self, key: TileKey, tile: Arc<T>) {
        if self.entries.insert(key, tile).is_none() {
            self.order.push_back(key);
        }

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Number of resident tiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of resident tiles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Keys currently resident, oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.order.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(n: u32) -> Arc<u32> {
        Arc::new(n)
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(TileKey::new(3, 1, 2), TileKey::new(3, 1, 2));
        assert_ne!(TileKey::new(3, 1, 2), TileKey::new(4, 1, 2));
        assert_ne!(TileKey::new(3, 1, 2), TileKey::new(3, 2, 1));
    }

    #[test]
    fn test_key_validity() {
        assert!(TileKey::new(0, 0, 0).is_valid());
        assert!(TileKey::new(3, 7, 7).is_valid());
        assert!(!TileKey::new(3, 8, 0).is_valid());
        assert!(!TileKey::new(3, 0, 8).is_valid());
    }

    #[test]
    fn test_basic_insert_get() {
        let mut cache = TileCache::new(4);
        let key = TileKey::new(3, 1, 2);

        assert!(cache.get(&key).is_none());
        cache.insert(key, tile(42));
        assert_eq!(cache.get(&key).as_deref(), Some(&42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let mut cache = TileCache::new(3);
        for i in 0..10u32 {
            cache.insert(TileKey::new(10, i, 0), tile(i));
        }

        assert_eq!(cache.len(), 3);
        for i in 0..7u32 {
            assert!(!cache.contains(&TileKey::new(10, i, 0)), "key {i} present");
        }
        for i in 7..10u32 {
            assert!(cache.contains(&TileKey::new(10, i, 0)), "key {i} missing");
        }
    }

    #[test]
    fn test_reads_do_not_affect_eviction() {
        let mut cache = TileCache::new(2);
        let a = TileKey::new(5, 0, 0);
        let b = TileKey::new(5, 1, 0);
        cache.insert(a, tile(0));
        cache.insert(b, tile(1));

        // Touch the oldest entry; FIFO must still evict it first.
        assert!(cache.get(&a).is_some());
        cache.insert(TileKey::new(5, 2, 0), tile(2));

        assert!(!cache.contains(&a));
        assert!(cache.contains(&b));
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut cache = TileCache::new(2);
        let a = TileKey::new(5, 0, 0);
        cache.insert(a, tile(0));
        cache.insert(TileKey::new(5, 1, 0), tile(1));

        // Replacing `a` must not move it to the back of the queue.
        cache.insert(a, tile(9));
        assert_eq!(cache.get(&a).as_deref(), Some(&9));

        cache.insert(TileKey::new(5, 2, 0), tile(2));
        assert!(!cache.contains(&a));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_map_and_order_stay_in_sync() {
        let mut cache = TileCache::new(4);
        for i in 0..20u32 {
            cache.insert(TileKey::new(9, i % 6, 0), tile(i));
            assert_eq!(cache.len(), cache.keys().count());
        }
        for key in cache.keys() {
            assert!(cache.entries.contains_key(key));
        }
    }

    #[test]
    fn test_clear() {
        let mut cache = TileCache::new(4);
        cache.insert(TileKey::new(1, 0, 0), tile(0));
        cache.insert(TileKey::new(1, 1, 0), tile(1));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.keys().count(), 0);
        assert_eq!(cache.capacity(), 4);
    }
}
