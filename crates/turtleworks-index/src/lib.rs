//! Patch-grid topology for agent neighborhood and offset queries.
//!
//! Patches are addressed by integer `(pxcor, pycor)` pairs and stored densely,
//! top row first, left to right. Turtles live on the continuous plane
//! `[min - 0.5, max + 0.5)` per axis; the patch containing a point is the one
//! whose center is nearest (`floor(coord + 0.5)`).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Errors emitted by topology construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., inverted bounds).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Dense patch position inside the grid.
pub type PatchIndex = usize;

/// Adjacent patches of one cell; never longer than eight.
pub type Neighbors = SmallVec<[PatchIndex; 8]>;

/// N, E, S, W first, then the diagonals clockwise from NE.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, -1),
    (-1, 1),
];

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Visit the distinct patches adjacent to `patch`, excluding `patch` itself.
    fn visit_neighbors(
        &self,
        patch: PatchIndex,
        diagonal: bool,
        visitor: &mut dyn FnMut(PatchIndex),
    );
}

/// Bounded or toroidal grid of patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    min_pxcor: i32,
    max_pxcor: i32,
    min_pycor: i32,
    max_pycor: i32,
    wrap_x: bool,
    wrap_y: bool,
}

impl Topology {
    /// Create a topology covering `[min_pxcor, max_pxcor] x [min_pycor, max_pycor]`.
    pub fn new(
        min_pxcor: i32,
        max_pxcor: i32,
        min_pycor: i32,
        max_pycor: i32,
        wrap_x: bool,
        wrap_y: bool,
    ) -> Result<Self, IndexError> {
        if min_pxcor > max_pxcor || min_pycor > max_pycor {
            return Err(IndexError::InvalidConfig(
                "minimum patch coordinate exceeds maximum",
            ));
        }
        if min_pxcor > 0 || max_pxcor < 0 || min_pycor > 0 || max_pycor < 0 {
            return Err(IndexError::InvalidConfig(
                "world bounds must contain the origin patch",
            ));
        }
        Ok(Self {
            min_pxcor,
            max_pxcor,
            min_pycor,
            max_pycor,
            wrap_x,
            wrap_y,
        })
    }

    #[must_use]
    pub const fn min_pxcor(&self) -> i32 {
        self.min_pxcor
    }

    #[must_use]
    pub const fn max_pxcor(&self) -> i32 {
        self.max_pxcor
    }

    #[must_use]
    pub const fn min_pycor(&self) -> i32 {
        self.min_pycor
    }

    #[must_use]
    pub const fn max_pycor(&self) -> i32 {
        self.max_pycor
    }

    #[must_use]
    pub const fn wrap_x(&self) -> bool {
        self.wrap_x
    }

    #[must_use]
    pub const fn wrap_y(&self) -> bool {
        self.wrap_y
    }

    /// Number of patch columns.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.max_pxcor - self.min_pxcor + 1
    }

    /// Number of patch rows.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.max_pycor - self.min_pycor + 1
    }

    /// Total number of patches in the grid.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Smallest continuous x coordinate a turtle may occupy.
    #[must_use]
    pub fn min_xcor(&self) -> f64 {
        f64::from(self.min_pxcor) - 0.5
    }

    /// Exclusive upper bound of the continuous x axis.
    #[must_use]
    pub fn max_xcor(&self) -> f64 {
        f64::from(self.max_pxcor) + 0.5
    }

    #[must_use]
    pub fn min_ycor(&self) -> f64 {
        f64::from(self.min_pycor) - 0.5
    }

    #[must_use]
    pub fn max_ycor(&self) -> f64 {
        f64::from(self.max_pycor) + 0.5
    }

    /// Returns true when `(pxcor, pycor)` names a patch of this grid.
    #[must_use]
    pub const fn contains_patch(&self, pxcor: i32, pycor: i32) -> bool {
        pxcor >= self.min_pxcor
            && pxcor <= self.max_pxcor
            && pycor >= self.min_pycor
            && pycor <= self.max_pycor
    }

    /// Dense index of the patch at `(pxcor, pycor)`, if it exists.
    #[must_use]
    pub fn index_of(&self, pxcor: i32, pycor: i32) -> Option<PatchIndex> {
        if !self.contains_patch(pxcor, pycor) {
            return None;
        }
        let row = (self.max_pycor - pycor) as usize;
        let col = (pxcor - self.min_pxcor) as usize;
        Some(row * self.width() as usize + col)
    }

    /// Coordinates of the patch stored at `index`.
    #[must_use]
    pub fn coords_of(&self, index: PatchIndex) -> (i32, i32) {
        let width = self.width() as usize;
        let row = (index / width) as i32;
        let col = (index % width) as i32;
        (self.min_pxcor + col, self.max_pycor - row)
    }

    /// Map a continuous x coordinate into the world, or `None` when it falls off a bounded edge.
    #[must_use]
    pub fn wrap_xcor(&self, x: f64) -> Option<f64> {
        wrap_axis(x, self.min_xcor(), self.max_xcor(), self.wrap_x)
    }

    /// Map a continuous y coordinate into the world, or `None` when it falls off a bounded edge.
    #[must_use]
    pub fn wrap_ycor(&self, y: f64) -> Option<f64> {
        wrap_axis(y, self.min_ycor(), self.max_ycor(), self.wrap_y)
    }

    /// Patch containing the continuous point `(x, y)` after wrapping.
    #[must_use]
    pub fn patch_containing(&self, x: f64, y: f64) -> Option<PatchIndex> {
        let x = self.wrap_xcor(x)?;
        let y = self.wrap_ycor(y)?;
        let pxcor = ((x + 0.5).floor() as i32).min(self.max_pxcor);
        let pycor = ((y + 0.5).floor() as i32).min(self.max_pycor);
        self.index_of(pxcor, pycor)
    }

    /// Patch offset by whole cells from `(pxcor, pycor)`.
    ///
    /// Each axis wraps modulo its span when configured to; otherwise an offset
    /// past the edge yields `None`.
    #[must_use]
    pub fn cell_offset(&self, pxcor: i32, pycor: i32, dx: i32, dy: i32) -> Option<PatchIndex> {
        let x = wrap_cell(
            i64::from(pxcor) + i64::from(dx),
            self.min_pxcor,
            self.max_pxcor,
            self.wrap_x,
        )?;
        let y = wrap_cell(
            i64::from(pycor) + i64::from(dy),
            self.min_pycor,
            self.max_pycor,
            self.wrap_y,
        )?;
        self.index_of(x, y)
    }

    /// Patch offset by a possibly fractional displacement from the center of `(pxcor, pycor)`.
    #[must_use]
    pub fn offset(&self, pxcor: i32, pycor: i32, dx: f64, dy: f64) -> Option<PatchIndex> {
        self.patch_containing(f64::from(pxcor) + dx, f64::from(pycor) + dy)
    }

    /// The up to eight patches surrounding `patch`.
    #[must_use]
    pub fn neighbors(&self, patch: PatchIndex) -> Neighbors {
        let mut out = Neighbors::new();
        self.visit_neighbors(patch, true, &mut |idx| out.push(idx));
        out
    }

    /// The up to four patches sharing an edge with `patch`.
    #[must_use]
    pub fn neighbors4(&self, patch: PatchIndex) -> Neighbors {
        let mut out = Neighbors::new();
        self.visit_neighbors(patch, false, &mut |idx| out.push(idx));
        out
    }

    /// Shortest signed x displacement from `from` to `to`, honoring wrap.
    #[must_use]
    pub fn delta_x(&self, from: f64, to: f64) -> f64 {
        shortest_delta(to - from, f64::from(self.width()), self.wrap_x)
    }

    /// Shortest signed y displacement from `from` to `to`, honoring wrap.
    #[must_use]
    pub fn delta_y(&self, from: f64, to: f64) -> f64 {
        shortest_delta(to - from, f64::from(self.height()), self.wrap_y)
    }

    /// Euclidean distance between two points along the shortest path.
    #[must_use]
    pub fn distance(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
        self.delta_x(x1, x2).hypot(self.delta_y(y1, y2))
    }

    /// Heading in degrees (0 = north, clockwise) from the first point to the second.
    ///
    /// Returns `None` when both points coincide.
    #[must_use]
    pub fn towards(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Option<f64> {
        let dx = self.delta_x(x1, x2);
        let dy = self.delta_y(y1, y2);
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        let heading = dx.atan2(dy).to_degrees();
        Some(if heading < 0.0 { heading + 360.0 } else { heading })
    }
}

impl NeighborhoodIndex for Topology {
    fn visit_neighbors(
        &self,
        patch: PatchIndex,
        diagonal: bool,
        visitor: &mut dyn FnMut(PatchIndex),
    ) {
        let (pxcor, pycor) = self.coords_of(patch);
        let count = if diagonal { 8 } else { 4 };
        let mut seen: SmallVec<[PatchIndex; 8]> = SmallVec::new();
        for &(dx, dy) in &NEIGHBOR_OFFSETS[..count] {
            let Some(idx) = self.cell_offset(pxcor, pycor, dx, dy) else {
                continue;
            };
            // Narrow tori map several offsets onto the same cell.
            if idx == patch || seen.contains(&idx) {
                continue;
            }
            seen.push(idx);
            visitor(idx);
        }
    }
}

fn wrap_axis(value: f64, low: f64, high: f64, wraps: bool) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if value >= low && value < high {
        return Some(value);
    }
    if !wraps {
        return None;
    }
    let wrapped = (value - low).rem_euclid(high - low) + low;
    // rem_euclid may round tiny negative remainders up to the full span.
    Some(if wrapped >= high { low } else { wrapped })
}

fn wrap_cell(value: i64, min: i32, max: i32, wraps: bool) -> Option<i32> {
    let (min, max) = (i64::from(min), i64::from(max));
    if value >= min && value <= max {
        return i32::try_from(value).ok();
    }
    if !wraps {
        return None;
    }
    let span = max - min + 1;
    i32::try_from((value - min).rem_euclid(span) + min).ok()
}

fn shortest_delta(delta: f64, span: f64, wraps: bool) -> f64 {
    if !wraps || delta.abs() <= span / 2.0 {
        return delta;
    }
    delta - span * (delta / span).round()
}
