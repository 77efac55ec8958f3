//! Reduction of parallel edges and short self-loops.

use std::collections::BTreeMap;

use crate::graph::{Edge, EdgeId, NodeId, SkeletonGraph};
use crate::measure::add_branch_info;

/// Remove the shortest edge between `u` and `v` if it is shorter than
/// `threshold`. Ties go to the lowest edge id.
///
/// Branch flags are not updated.
pub fn remove_small_mul(
    graph: &mut SkeletonGraph,
    u: NodeId,
    v: NodeId,
    threshold: f64,
) -> Option<(EdgeId, Edge)> {
    let shortest = graph
        .edges_between(u, v)
        .into_iter()
        .filter_map(|id| graph.edge(id).map(|e| (id, e.length)))
        .reduce(|best, cur| if cur.1 < best.1 { cur } else { best })?;
    if shortest.1 >= threshold {
        return None;
    }
    let edge = graph.remove_edge(shortest.0).ok()?;
    tracing::trace!(edge = shortest.0, u, v, length = edge.length, "removed short parallel edge");
    Some((shortest.0, edge))
}

/// Drop short self-loops and short parallel edges, then recompute branch
/// flags.
///
/// Every self-loop shorter than `threshold` is removed. For each node
/// pair joined by several edges, edges shorter than `threshold` are
/// removed except the longest one of the pair (lowest id on ties), so a
/// pair never loses its last connection here.
///
/// Returns the number of removed edges.
pub fn remove_small_mul_all(graph: &mut SkeletonGraph, threshold: f64) -> usize {
    let mut removed = 0;

    let short_loops: Vec<EdgeId> = graph
        .self_loops()
        .into_iter()
        .filter(|&id| graph.edge(id).is_some_and(|e| e.length < threshold))
        .collect();
    for id in short_loops {
        if graph.remove_edge(id).is_ok() {
            removed += 1;
        }
    }

    let mut groups: BTreeMap<(NodeId, NodeId), Vec<(EdgeId, f64)>> = BTreeMap::new();
    for (id, edge) in graph.edges() {
        groups
            .entry(edge.endpoints())
            .or_default()
            .push((id, edge.length));
    }
    let mut doomed = Vec::new();
    for edges in groups.values().filter(|g| g.len() > 1) {
        let Some(&(longest, _)) = edges
            .iter()
            .reduce(|best, cur| if cur.1 > best.1 { cur } else { best })
        else {
            continue;
        };
        doomed.extend(
            edges
                .iter()
                .filter(|&&(id, len)| id != longest && len < threshold)
                .map(|&(id, _)| id),
        );
    }
    for id in doomed {
        if graph.remove_edge(id).is_ok() {
            removed += 1;
        }
    }

    add_branch_info(graph);
    tracing::debug!(removed, threshold, "reduced multi-edges and self-loops");
    removed
}
