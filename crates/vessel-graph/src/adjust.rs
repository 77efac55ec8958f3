//! Topology simplification of a constructed graph.
//!
//! [`adjust_graph`] chains the reduction passes on a working copy:
//!
//! 1. length and branch annotation
//! 2. short self-loops and parallel edges (twice the threshold)
//! 3. degree-two elimination
//! 4. short branch pruning
//! 5. small component removal (twice the threshold)
//! 6. optional cleanup of isolated nodes and dense relabeling

use crate::components::remove_small_graph_components;
use crate::degree_two::remove_degree_two_nodes;
use crate::graph::{NodeId, SkeletonGraph};
use crate::measure::{add_branch_info, add_length};
use crate::multiedge::remove_small_mul_all;
use crate::prune::remove_branches;
use crate::types::{AdjustConfig, GraphError};

/// Simplify `graph` according to `config` and return the result.
///
/// The input graph is left untouched.
///
/// # Errors
///
/// Returns [`GraphError::InvalidConfig`] if the config does not validate,
/// and [`GraphError::Inconsistent`] (or a lookup error) only if the graph
/// violates its own invariants.
pub fn adjust_graph(
    graph: &SkeletonGraph,
    config: &AdjustConfig,
) -> Result<SkeletonGraph, GraphError> {
    config.validate()?;
    let threshold = config.length_threshold;
    let mut work = graph.clone();

    add_length(&mut work);
    add_branch_info(&mut work);
    remove_small_mul_all(&mut work, 2.0 * threshold);
    remove_degree_two_nodes(&mut work, threshold)?;
    remove_branches(&mut work, threshold)?;
    remove_small_graph_components(&mut work, 2.0 * threshold);

    Ok(cleanup(work, config))
}

/// Apply the node cleanup requested by `config`.
pub(crate) fn cleanup(mut graph: SkeletonGraph, config: &AdjustConfig) -> SkeletonGraph {
    if config.keep_nodes {
        return graph;
    }
    remove_zero_degree_nodes(&mut graph);
    if config.collapse_indices {
        relabel_dense(&graph)
    } else {
        graph
    }
}

/// Remove every node without incident edges. Returns how many were
/// removed.
pub fn remove_zero_degree_nodes(graph: &mut SkeletonGraph) -> usize {
    let isolated: Vec<NodeId> = graph.node_ids().filter(|&n| graph.degree(n) == 0).collect();
    let mut removed = 0;
    for id in isolated {
        if graph.remove_node(id).is_ok() {
            removed += 1;
        }
    }
    tracing::debug!(removed, "removed isolated nodes");
    removed
}

/// Copy of `graph` with node ids renumbered to `0..N` in ascending order
/// of the old ids. Each node's previous id is stored in `old_id`.
///
/// Edges are re-added in ascending id order, keeping their attributes.
#[must_use]
pub fn relabel_dense(graph: &SkeletonGraph) -> SkeletonGraph {
    let mut out = SkeletonGraph::new(graph.metadata().clone());
    let mut mapping = std::collections::HashMap::with_capacity(graph.node_count());
    for (old, node) in graph.nodes() {
        let mut node = node.clone();
        node.old_id = Some(old);
        mapping.insert(old, out.add_node(node));
    }

    for (id, edge) in graph.edges() {
        let (Some(&a), Some(&b)) = (mapping.get(&edge.a()), mapping.get(&edge.b())) else {
            tracing::warn!(edge = id, "skipping edge with unknown endpoint while relabeling");
            continue;
        };
        // Dense ids preserve the order of the old ones, so the stored
        // orientation stays valid.
        if let Ok(new_id) = out.add_edge(a, b, edge.path.clone(), edge.length)
            && let Some(e) = out.edge_mut(new_id)
        {
            e.is_branch = edge.is_branch;
        }
    }
    out
}
