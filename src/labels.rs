//! Label placement with collision avoidance.
//!
//! Terminal output draws sub-pixels on a braille grid: every character cell
//! addresses a 2×4 block of dots. Labels, however, occupy whole character
//! cells, so placement works in "label-grid" coordinates: pixel coordinates
//! floor-divided by the block size. An R-tree over committed label
//! rectangles answers both "does this candidate collide" and "what label is
//! under this point" in sub-linear time.
//!
//! The index lives for one render cycle: the renderer calls
//! [`LabelPlacer::clear`] before walking features, then attempts placements
//! in draw order. Placement rejection is routine, not an error.

use rstar::{RTree, RTreeObject, AABB};
use unicode_width::UnicodeWidthStr;

use crate::config::Settings;

/// Default clearance around placed labels, in grid cells.
pub const DEFAULT_LABEL_MARGIN: u16 = 5;

/// Horizontal sub-pixels per character cell.
const CELL_WIDTH: i32 = 2;

/// Vertical sub-pixels per character cell.
const CELL_HEIGHT: i32 = 4;

// =============================================================================
// Placed Label
// =============================================================================

/// A committed label rectangle tagged with its originating feature.
///
/// Bounds are closed intervals in label-grid coordinates. The feature is a
/// non-owning back-reference kept for hit-testing; the placer owns no map
/// data.
#[derive(Debug, Clone)]
pub struct PlacedLabel<F> {
    min: [i32; 2],
    max: [i32; 2],
    feature: F,
}

impl<F> PlacedLabel<F> {
    /// The feature this label was placed for.
    pub fn feature(&self) -> &F {
        &self.feature
    }

    /// Bounds as `(min_x, min_y, max_x, max_y)` in grid coordinates.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.min[0], self.min[1], self.max[0], self.max[1])
    }
}

impl<F> RTreeObject for PlacedLabel<F> {
    type Envelope = AABB<[i32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

// =============================================================================
// Label Placer
// =============================================================================

/// Decides whether text labels fit without overlapping previous placements.
///
/// Placement is check-then-insert; `&mut self` makes the pair atomic with
/// respect to other placement attempts. Parallel feature processing must
/// serialize around it to keep the no-overlap guarantee.
pub struct LabelPlacer<F> {
    tree: RTree<PlacedLabel<F>>,
    margin: u16,
}

impl<F> LabelPlacer<F> {
    /// Create an empty placer with the configured default margin.
    pub fn new(settings: &Settings) -> Self {
        Self::with_margin(settings.label_margin)
    }

    /// Create an empty placer with an explicit default margin.
    pub fn with_margin(margin: u16) -> Self {
        Self {
            tree: RTree::new(),
            margin,
        }
    }

    /// Discard every placement. Called once per render cycle; there is no
    /// partial invalidation.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Map fine pixel coordinates onto the label grid.
    ///
    /// Floor division, so negative (off-screen) coordinates land in the
    /// correct cell. Placement and queries use the same mapping.
    pub fn project(x: i32, y: i32) -> (i32, i32) {
        (x.div_euclid(CELL_WIDTH), y.div_euclid(CELL_HEIGHT))
    }

    /// Try to place `text` with its anchor at pixel `(x, y)`.
    ///
    /// The candidate rectangle spans the text's display width (Unicode
    /// column width, not character count) and one grid row, expanded by the
    /// margin horizontally and half the margin vertically; grid cells are
    /// twice as tall as they are wide, so equal clearance needs half the
    /// cells. `margin` overrides the configured default for this call.
    ///
    /// Bounds are closed on both sides: a candidate touching an existing
    /// rectangle's edge collides. Returns `true` and commits the rectangle
    /// only when nothing intersects; a rejected candidate leaves the index
    /// unchanged.
    pub fn write_if_possible(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        feature: F,
        margin: Option<u16>,
    ) -> bool {
        let (gx, gy) = Self::project(x, y);
        let width = text.width() as i32;
        let margin = margin.unwrap_or(self.margin) as i32;
        let half = margin / 2;

        let min = [gx - margin, gy - half];
        let max = [gx + width + margin, gy + half];
        let candidate = AABB::from_corners(min, max);

        if self
            .tree
            .locate_in_envelope_intersecting(&candidate)
            .next()
            .is_some()
        {
            return false;
        }

        self.tree.insert(PlacedLabel { min, max, feature });
        true
    }

    /// Every placed label whose bounds contain the grid point `(gx, gy)`.
    ///
    /// Callers holding pixel coordinates must [`project`](Self::project)
    /// them first, mirroring placement. An empty result is a valid outcome.
    pub fn features_at(&self, gx: i32, gy: i32) -> impl Iterator<Item = &PlacedLabel<F>> + '_ {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([gx, gy]))
    }

    /// Number of committed labels this cycle.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no labels are committed.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

// =============================================================================
// Tests
// =============================================================================
