//! Removal of small connected components.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use crate::graph::{EdgeId, NodeId, SkeletonGraph};

/// Remove every edge of each connected component whose total edge
/// length is below `threshold`. Nodes are kept (with degree 0).
///
/// Returns the number of removed edges.
pub fn remove_small_graph_components(graph: &mut SkeletonGraph, threshold: f64) -> usize {
    let index: HashMap<NodeId, usize> = graph
        .node_ids()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let mut uf = UnionFind::<usize>::new(index.len());
    for (_, edge) in graph.edges() {
        if let (Some(&ia), Some(&ib)) = (index.get(&edge.a()), index.get(&edge.b())) {
            uf.union(ia, ib);
        }
    }

    let mut component_length: HashMap<usize, f64> = HashMap::new();
    let mut component_edges: HashMap<usize, Vec<EdgeId>> = HashMap::new();
    for (id, edge) in graph.edges() {
        let Some(&ia) = index.get(&edge.a()) else {
            continue;
        };
        let root = uf.find_mut(ia);
        *component_length.entry(root).or_insert(0.0) += edge.length;
        component_edges.entry(root).or_default().push(id);
    }

    let mut doomed: Vec<EdgeId> = component_edges
        .into_iter()
        .filter(|(root, _)| component_length.get(root).is_some_and(|&len| len < threshold))
        .flat_map(|(_, edges)| edges)
        .collect();
    doomed.sort_unstable();

    let mut removed = 0;
    for id in doomed {
        if graph.remove_edge(id).is_ok() {
            removed += 1;
        }
    }
    tracing::debug!(removed, threshold, "removed small components");
    removed
}
