//! Interest point detection: terminations and bifurcation regions.
//!
//! A termination is a skeleton pixel with exactly one neighbor. A
//! bifurcation is a connected region of pixels that each have three or
//! more neighbors. Every interest point also records its *branches*:
//! the neighbor-count-2 pixels touching it, which are where the paths
//! leaving the point begin.

use std::collections::{HashMap, HashSet};

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::grid::{NeighborGrid, neighbors};
use crate::types::{GraphError, MAX_DIMS, Pixel, PointType};

/// A termination pixel or a connected bifurcation region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestPoint {
    pixels: Vec<Pixel>,
    center: Pixel,
    kind: PointType,
    branches: Vec<Pixel>,
}

impl InterestPoint {
    /// Create an interest point from its pixels.
    ///
    /// The center is the centroid of `pixels`, rounded half-to-even on
    /// every axis. Branches start out empty; see
    /// [`with_branches`](Self::with_branches).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Inconsistent`] if `pixels` is empty or mixes
    /// dimensionalities.
    pub fn new(pixels: Vec<Pixel>, kind: PointType) -> Result<Self, GraphError> {
        let center = centroid(&pixels)?;
        Ok(Self {
            pixels,
            center,
            kind,
            branches: Vec::new(),
        })
    }

    /// Pixels composing the point.
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Representative pixel of the point.
    #[must_use]
    pub const fn center(&self) -> Pixel {
        self.center
    }

    /// Termination or bifurcation.
    #[must_use]
    pub const fn kind(&self) -> PointType {
        self.kind
    }

    /// Branch pixels, empty until [`with_branches`](Self::with_branches)
    /// has been called.
    #[must_use]
    pub fn branches(&self) -> &[Pixel] {
        &self.branches
    }

    /// Number of axes of the point's pixels.
    #[must_use]
    pub const fn ndim(&self) -> usize {
        self.center.ndim()
    }

    /// Populate the branch pixels from the neighbor grid.
    ///
    /// A branch is any in-bounds neighbor of one of the point's pixels
    /// whose neighbor count is exactly 2. Branches are listed once each,
    /// in discovery order (point pixels in order, neighbors in
    /// [`neighbor_offsets`](crate::grid::neighbor_offsets) order). Once
    /// populated, the branch list is kept as is.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DimensionMismatch`] if the point and the grid
    /// have different dimensionality.
    pub fn with_branches(mut self, grid: &NeighborGrid) -> Result<Self, GraphError> {
        if self.ndim() != grid.ndim() {
            return Err(GraphError::DimensionMismatch {
                point: self.ndim(),
                grid: grid.ndim(),
            });
        }
        if !self.branches.is_empty() {
            return Ok(self);
        }

        let mut seen = HashSet::new();
        let mut branches = Vec::new();
        for &pixel in &self.pixels {
            for neighbor in neighbors(pixel) {
                if grid.has_count(&neighbor, 2) && seen.insert(neighbor) {
                    branches.push(neighbor);
                }
            }
        }
        self.branches = branches;
        Ok(self)
    }

    /// Shift every coordinate of the point by `-amount`.
    #[must_use]
    pub fn unpadded(self, amount: i64) -> Self {
        Self {
            pixels: self.pixels.into_iter().map(|p| p.shifted(amount)).collect(),
            center: self.center.shifted(amount),
            kind: self.kind,
            branches: self.branches.into_iter().map(|p| p.shifted(amount)).collect(),
        }
    }
}

/// Rounded centroid of a non-empty set of same-dimension pixels.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn centroid(pixels: &[Pixel]) -> Result<Pixel, GraphError> {
    let Some(first) = pixels.first() else {
        return Err(GraphError::Inconsistent(
            "interest point has no pixels".to_string(),
        ));
    };
    let ndim = first.ndim();
    if pixels.iter().any(|p| p.ndim() != ndim) {
        return Err(GraphError::Inconsistent(
            "interest point mixes pixel dimensionalities".to_string(),
        ));
    }

    let mut sums = [0_i64; MAX_DIMS];
    for p in pixels {
        for (s, c) in sums.iter_mut().zip(p.coords()) {
            *s += c;
        }
    }
    let n = pixels.len() as f64;
    let mut coords = [0_i64; MAX_DIMS];
    for (c, s) in coords.iter_mut().zip(sums).take(ndim) {
        *c = (s as f64 / n).round_ties_even() as i64;
    }
    Pixel::from_slice(&coords[..ndim])
}

/// Group the grid pixels selected by `select` into connected regions.
///
/// Regions are ordered by their first pixel in row-major order and list
/// their pixels in row-major order.
fn connected_regions(grid: &NeighborGrid, select: impl Fn(i8) -> bool) -> Vec<Vec<Pixel>> {
    let candidates: Vec<Pixel> = grid
        .iter()
        .filter(|&(_, count)| select(count))
        .map(|(p, _)| p)
        .collect();
    let position: HashMap<Pixel, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, &p)| (p, i))
        .collect();

    let mut uf = UnionFind::<usize>::new(candidates.len());
    for (i, &pixel) in candidates.iter().enumerate() {
        for neighbor in neighbors(pixel) {
            if let Some(&j) = position.get(&neighbor) {
                uf.union(i, j);
            }
        }
    }

    let mut region_of_root: HashMap<usize, usize> = HashMap::new();
    let mut regions: Vec<Vec<Pixel>> = Vec::new();
    for (i, &pixel) in candidates.iter().enumerate() {
        let root = uf.find_mut(i);
        let region = *region_of_root.entry(root).or_insert_with(|| {
            regions.push(Vec::new());
            regions.len() - 1
        });
        regions[region].push(pixel);
    }
    regions
}

/// Detect every interest point of the grid.
///
/// Bifurcation regions (count >= 3) come first, then terminations
/// (count == 1). Adjacent pixels of the same kind are grouped under
/// 8-/26-connectivity; in a valid skeleton terminations are never
/// adjacent to each other, so each termination is a single pixel. The
/// returned points do not have branches yet.
#[must_use]
pub fn find_interest_points(grid: &NeighborGrid) -> Vec<InterestPoint> {
    let bifurcations = connected_regions(grid, |c| c >= 3)
        .into_iter()
        .map(|pixels| (pixels, PointType::Bifurcation));
    let terminations = connected_regions(grid, |c| c == 1)
        .into_iter()
        .map(|pixels| (pixels, PointType::Termination));

    let points: Vec<InterestPoint> = bifurcations
        .chain(terminations)
        .filter_map(|(pixels, kind)| InterestPoint::new(pixels, kind).ok())
        .collect();

    tracing::debug!(count = points.len(), "detected interest points");
    points
}

/// Populate branches on every interest point.
///
/// # Errors
///
/// Returns [`GraphError::DimensionMismatch`] if any point disagrees with
/// the grid's dimensionality.
pub fn add_branches(
    points: Vec<InterestPoint>,
    grid: &NeighborGrid,
) -> Result<Vec<InterestPoint>, GraphError> {
    points.into_iter().map(|p| p.with_branches(grid)).collect()
}

/// Reverse index from branch pixel to the interest points claiming it.
///
/// Usually a branch belongs to exactly one point. A single pixel lying
/// between two interest points is a branch of both.
#[derive(Debug, Clone, Default)]
pub struct BranchMap {
    claims: HashMap<Pixel, Vec<usize>>,
}

impl BranchMap {
    /// Index the branches of `points` by pixel.
    #[must_use]
    pub fn new(points: &[InterestPoint]) -> Self {
        let mut claims: HashMap<Pixel, Vec<usize>> = HashMap::new();
        for (idx, point) in points.iter().enumerate() {
            for &branch in point.branches() {
                let owners = claims.entry(branch).or_default();
                if !owners.contains(&idx) {
                    owners.push(idx);
                }
            }
        }
        Self { claims }
    }

    /// Indices of the points that have `pixel` as a branch, in point order.
    #[must_use]
    pub fn owners(&self, pixel: &Pixel) -> &[usize] {
        self.claims.get(pixel).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::Skeleton;

    fn grid_from_rows(rows: &[&str]) -> NeighborGrid {
        let width = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        NeighborGrid::from_skeleton(&Skeleton::new(vec![rows.len(), width], data).unwrap())
    }

    #[test]
    fn empty_grid_has_no_points() {
        let grid = grid_from_rows(&["....", "...."]);
        assert!(find_interest_points(&grid).is_empty());
    }

    #[test]
    fn straight_line_has_two_terminations() {
        let grid = grid_from_rows(&["#####"]);
        let points = find_interest_points(&grid);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.kind() == PointType::Termination));
        assert_eq!(points[0].pixels(), &[Pixel::new_2d(1, 1)]);
        assert_eq!(points[1].pixels(), &[Pixel::new_2d(1, 5)]);
    }

    #[test]
    fn cross_center_is_one_bifurcation_region() {
        let grid = grid_from_rows(&[
            "...#...", //
            "...#...", //
            "...#...", //
            "#######", //
            "...#...", //
            "...#...", //
            "...#...",
        ]);
        let points = find_interest_points(&grid);
        let bifurcations: Vec<_> = points
            .iter()
            .filter(|p| p.kind() == PointType::Bifurcation)
            .collect();
        assert_eq!(bifurcations.len(), 1);
        // The center and the first pixel of each arm all have 4 neighbors
        // and form a single region.
        assert_eq!(bifurcations[0].center(), Pixel::new_2d(4, 4));
        assert_eq!(points.len(), 5);
    }

    #[test]
    fn centroid_rounds_half_to_even() {
        let p = InterestPoint::new(
            vec![Pixel::new_2d(1, 1), Pixel::new_2d(1, 2)],
            PointType::Bifurcation,
        )
        .unwrap();
        // Mean column 1.5 rounds to 2.
        assert_eq!(p.center(), Pixel::new_2d(1, 2));
        let p = InterestPoint::new(
            vec![Pixel::new_2d(2, 2), Pixel::new_2d(2, 3)],
            PointType::Bifurcation,
        )
        .unwrap();
        // Mean column 2.5 rounds to 2.
        assert_eq!(p.center(), Pixel::new_2d(2, 2));
    }

    #[test]
    fn empty_point_is_rejected() {
        assert!(InterestPoint::new(vec![], PointType::Termination).is_err());
    }

    #[test]
    fn branches_are_count_two_neighbors() {
        let grid = grid_from_rows(&["#####"]);
        let points = add_branches(find_interest_points(&grid), &grid).unwrap();
        assert_eq!(points[0].branches(), &[Pixel::new_2d(1, 2)]);
        assert_eq!(points[1].branches(), &[Pixel::new_2d(1, 4)]);
    }

    #[test]
    fn branches_are_cached() {
        let grid = grid_from_rows(&["#####"]);
        let point = find_interest_points(&grid).remove(0).with_branches(&grid).unwrap();
        let other = grid_from_rows(&["#.#.#"]);
        // A second call with another grid keeps the first result.
        let again = point.clone().with_branches(&other).unwrap();
        assert_eq!(point, again);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let grid = grid_from_rows(&["###"]);
        let point = InterestPoint::new(vec![Pixel::new_3d(0, 0, 0)], PointType::Termination)
            .unwrap();
        assert_eq!(
            point.with_branches(&grid),
            Err(GraphError::DimensionMismatch { point: 3, grid: 2 })
        );
    }

    #[test]
    fn shared_branch_is_claimed_by_both_points() {
        // In a three-pixel line the middle pixel is a branch of both ends.
        let grid = grid_from_rows(&["###"]);
        let points = add_branches(find_interest_points(&grid), &grid).unwrap();
        let map = BranchMap::new(&points);
        assert_eq!(map.owners(&Pixel::new_2d(1, 2)), &[0, 1]);
        assert!(map.owners(&Pixel::new_2d(0, 0)).is_empty());
    }

    #[test]
    fn unpadded_shifts_everything() {
        let grid = grid_from_rows(&["###"]);
        let point = find_interest_points(&grid)
            .remove(0)
            .with_branches(&grid)
            .unwrap()
            .unpadded(1);
        assert_eq!(point.pixels(), &[Pixel::new_2d(0, 0)]);
        assert_eq!(point.center(), Pixel::new_2d(0, 0));
        assert_eq!(point.branches(), &[Pixel::new_2d(0, 1)]);
    }
}
