//! Branch tracking: walking chains of two-neighbor pixels between
//! interest points.

use std::collections::HashSet;

use crate::grid::{NeighborGrid, neighbors};
use crate::interest::{BranchMap, InterestPoint};
use crate::types::{GraphError, Pixel};

/// A tracked path between two interest points, identified by their
/// index in the interest point list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPath {
    /// Point whose branch started the walk.
    pub from: usize,
    /// Point that claims the last pixel of the walk as a branch.
    pub to: usize,
    /// Pixels from `from`'s side to `to`'s side, all with two neighbors.
    pub path: Vec<Pixel>,
}

/// Walk the chain starting at branch `branch_index` of `point`.
///
/// At every step the first not-yet-visited neighbor with count 2 (in
/// [`neighbor_offsets`](crate::grid::neighbor_offsets) order) is taken.
/// The walk stops when no such neighbor exists, which on a valid skeleton
/// means the last pixel is a branch of another interest point (or of the
/// same one, for a loop).
///
/// # Errors
///
/// Returns [`GraphError::BranchIndexOutOfRange`] if `point` has fewer
/// than `branch_index + 1` branches.
pub fn track_branch(
    point: &InterestPoint,
    branch_index: usize,
    grid: &NeighborGrid,
) -> Result<Vec<Pixel>, GraphError> {
    let Some(&first) = point.branches().get(branch_index) else {
        return Err(GraphError::BranchIndexOutOfRange {
            index: branch_index,
            available: point.branches().len(),
        });
    };

    let mut visited: HashSet<Pixel> = HashSet::from([first]);
    let mut path = vec![first];
    let mut current = first;
    while let Some(next) =
        neighbors(current).find(|n| grid.has_count(n, 2) && !visited.contains(n))
    {
        visited.insert(next);
        path.push(next);
        current = next;
    }
    Ok(path)
}

/// Resolve the interest point at the far end of a walk.
///
/// When the last pixel is claimed by two points (a single pixel between
/// them), the point that did not start the walk is chosen.
fn resolve_endpoint(
    map: &BranchMap,
    from: usize,
    last: Pixel,
) -> Result<usize, GraphError> {
    match *map.owners(&last) {
        [] => Err(GraphError::UnknownBranchEndpoint {
            pixel: last.coords().to_vec(),
        }),
        [only] => Ok(only),
        [first, second, ..] => Ok(if first == from { second } else { first }),
    }
}

/// Track every branch of every interest point exactly once.
///
/// A branch is skipped if it was already visited as the first or last
/// pixel of an earlier walk, so each chain produces a single path.
/// Points must already have their branches populated.
///
/// # Errors
///
/// Returns [`GraphError::UnknownBranchEndpoint`] if a walk ends on a
/// pixel that no interest point claims.
pub fn track_branches(
    points: &[InterestPoint],
    grid: &NeighborGrid,
) -> Result<Vec<TrackedPath>, GraphError> {
    let map = BranchMap::new(points);
    let mut visited: HashSet<Pixel> = HashSet::new();
    let mut tracked = Vec::new();

    for (from, point) in points.iter().enumerate() {
        for (index, branch) in point.branches().iter().enumerate() {
            if visited.contains(branch) {
                continue;
            }
            let path = track_branch(point, index, grid)?;
            let Some(&last) = path.last() else {
                continue;
            };
            visited.insert(*branch);
            visited.insert(last);
            let to = resolve_endpoint(&map, from, last)?;
            tracing::trace!(from, to, len = path.len(), "tracked branch");
            tracked.push(TrackedPath { from, to, path });
        }
    }

    tracing::debug!(paths = tracked.len(), "tracked branches");
    Ok(tracked)
}
