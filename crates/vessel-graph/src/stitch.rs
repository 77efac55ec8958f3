//! Path stitching: extend edge paths so they reach node centers.
//!
//! A tracked path starts at a branch pixel on the border of a
//! bifurcation region, not at the region's center. Stitching prepends
//! (and appends) the discretized straight line from the center to the
//! path so the edge becomes a continuous chain between the two node
//! centers. Node attributes and edge lengths are left untouched.

use crate::graph::{Node, SkeletonGraph};
use crate::line::line_between;
use crate::types::Pixel;

/// Return a copy of `graph` with every edge path stitched to the
/// centers of its endpoints.
///
/// Single-pixel nodes need no extension, since their only pixel is
/// already adjacent to the path. Edges with an empty path are kept
/// as is.
#[must_use]
pub fn simplify(graph: &SkeletonGraph) -> SkeletonGraph {
    let mut out = graph.clone();
    let mut stitched = 0_usize;
    for (id, edge) in graph.edges() {
        let (Some(node_a), Some(node_b)) = (graph.node(edge.a()), graph.node(edge.b())) else {
            continue;
        };
        let path = stitch_path(node_a, &edge.path, node_b);
        if path.len() != edge.path.len() {
            stitched += 1;
        }
        if let Some(e) = out.edge_mut(id) {
            e.path = path;
        }
    }
    tracing::debug!(stitched, edges = graph.edge_count(), "stitched edge paths");
    out
}

/// Extend `path` (running from `from` to `to`) with the lines joining it
/// to both node centers, centers excluded.
#[must_use]
pub fn stitch_path(from: &Node, path: &[Pixel], to: &Node) -> Vec<Pixel> {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return path.to_vec();
    };
    let head = if from.pixels.len() > 1 {
        line_between(from.center, first)
    } else {
        Vec::new()
    };
    let tail = if to.pixels.len() > 1 {
        line_between(last, to.center)
    } else {
        Vec::new()
    };

    let mut out = Vec::with_capacity(head.len() + path.len() + tail.len());
    out.extend(head);
    out.extend_from_slice(path);
    out.extend(tail);
    out
}
