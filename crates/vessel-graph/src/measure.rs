//! Arc length and branch annotation.

use crate::graph::{EdgeId, SkeletonGraph};
use crate::types::Pixel;

/// Euclidean arc length of a pixel path, each axis scaled by its
/// physical pixel size. Axes without a size use 1.0.
///
/// Paths with fewer than two pixels have zero length.
#[must_use]
pub fn path_length(path: &[Pixel], pixel_size: &[f64]) -> f64 {
    path.windows(2)
        .map(|w| step_length(w[0], w[1], pixel_size))
        .sum()
}

#[allow(clippy::cast_precision_loss)]
fn step_length(p: Pixel, q: Pixel, pixel_size: &[f64]) -> f64 {
    p.coords()
        .iter()
        .zip(q.coords())
        .enumerate()
        .map(|(axis, (a, b))| {
            let d = (b - a) as f64 * pixel_size.get(axis).copied().unwrap_or(1.0);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Recompute `length` for every edge from its path.
pub fn add_length(graph: &mut SkeletonGraph) {
    let pixel_size = graph.metadata().pixel_size.clone();
    let ids: Vec<EdgeId> = graph.edge_ids().collect();
    for id in ids {
        if let Some(edge) = graph.edge_mut(id) {
            edge.length = path_length(&edge.path, &pixel_size);
        }
    }
}

/// Set `is_branch` on every edge: true iff one endpoint has degree 1.
pub fn add_branch_info(graph: &mut SkeletonGraph) {
    let flags: Vec<(EdgeId, bool)> = graph
        .edge_ids()
        .map(|id| (id, graph.touches_leaf(id)))
        .collect();
    for (id, is_branch) in flags {
        if let Some(edge) = graph.edge_mut(id) {
            edge.is_branch = is_branch;
        }
    }
}
