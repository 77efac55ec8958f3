//! Elimination of degree-two nodes.
//!
//! A node with exactly two edge endpoints is neither a termination nor a
//! bifurcation, so its two edges are merged into one running through the
//! node's center. Merging can create a new parallel edge between the
//! former neighbors; when one of the parallel edges is short it is
//! dropped, which may in turn create new degree-two nodes. The work list
//! is processed until no eligible node remains.
//!
//! The eliminated node itself stays in the graph with degree 0 until the
//! final cleanup.

use std::collections::BTreeSet;

use crate::graph::{Edge, EdgeId, NodeId, SkeletonGraph};
use crate::measure::path_length;
use crate::multiedge::remove_small_mul;
use crate::types::{GraphError, Pixel};

/// Connectivity of a degree-two node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegreeTwoKind {
    /// One edge to each of two distinct neighbors.
    Simple,
    /// Two parallel edges to a single neighbor.
    Multiple,
    /// A single self-loop; cannot be eliminated.
    Loop,
}

/// Classify `node`, or `None` if its degree is not 2.
#[must_use]
pub fn degree_two_kind(graph: &SkeletonGraph, node: NodeId) -> Option<DegreeTwoKind> {
    let &[e1, e2] = graph.incident_edges(node) else {
        return None;
    };
    if e1 == e2 {
        return Some(DegreeTwoKind::Loop);
    }
    let n1 = graph.edge(e1)?.opposite(node);
    let n2 = graph.edge(e2)?.opposite(node);
    Some(if n1 == n2 {
        DegreeTwoKind::Multiple
    } else {
        DegreeTwoKind::Simple
    })
}

/// Edges that became branches and branch edges that were removed during
/// one elimination run.
///
/// An edge added and later removed within the same run appears in
/// neither set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchChanges {
    /// Edges now flagged as branches.
    pub added: BTreeSet<EdgeId>,
    /// Former branch edges no longer in the graph.
    pub removed: BTreeSet<EdgeId>,
}

impl BranchChanges {
    fn record_added(&mut self, edge: EdgeId) {
        self.added.insert(edge);
    }

    fn record_removed(&mut self, edge: EdgeId) {
        if !self.added.remove(&edge) {
            self.removed.insert(edge);
        }
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The two edges of a degree-two node, ordered so that `nei1 <= nei2`.
#[derive(Debug, Clone, Copy)]
struct Junction {
    kind: DegreeTwoKind,
    nei1: NodeId,
    nei2: NodeId,
    edge1: EdgeId,
    edge2: EdgeId,
}

fn junction(graph: &SkeletonGraph, node: NodeId) -> Result<Junction, GraphError> {
    let kind = degree_two_kind(graph, node).ok_or_else(|| {
        GraphError::Inconsistent(format!(
            "node {node} has degree {}, expected 2",
            graph.degree(node)
        ))
    })?;
    if kind == DegreeTwoKind::Loop {
        return Err(GraphError::SelfLoopElimination { node });
    }
    let &[e1, e2] = graph.incident_edges(node) else {
        return Err(GraphError::Inconsistent(format!("node {node} lost its edges")));
    };
    let n1 = graph.edge(e1).ok_or(GraphError::EdgeNotFound(e1))?.opposite(node);
    let n2 = graph.edge(e2).ok_or(GraphError::EdgeNotFound(e2))?.opposite(node);
    Ok(if n1 <= n2 {
        Junction {
            kind,
            nei1: n1,
            nei2: n2,
            edge1: e1,
            edge2: e2,
        }
    } else {
        Junction {
            kind,
            nei1: n2,
            nei2: n1,
            edge1: e2,
            edge2: e1,
        }
    })
}

/// Path of `edge` oriented so that it starts on `from`'s side.
fn oriented(edge: &Edge, from: NodeId) -> Vec<Pixel> {
    let mut path = edge.path.clone();
    if edge.a() != from {
        path.reverse();
    }
    path
}

/// Merge the two edges of a simple or multiple degree-two node.
///
/// The new path is `edge1` (oriented toward the node), then the node's
/// center, then `edge2` (oriented away from it). Its length is the sum of
/// both lengths plus the length of the connector through the center.
/// Returns the new edge and the two removed ones.
fn merge(
    graph: &mut SkeletonGraph,
    node: NodeId,
    j: Junction,
) -> Result<(EdgeId, [(EdgeId, Edge); 2]), GraphError> {
    let center = graph.node(node).ok_or(GraphError::NodeNotFound(node))?.center;
    let edge1 = graph.remove_edge(j.edge1)?;
    let edge2 = graph.remove_edge(j.edge2)?;

    let path1 = oriented(&edge1, j.nei1);
    let path2 = oriented(&edge2, node);
    let connector: Vec<Pixel> = path1
        .last()
        .copied()
        .into_iter()
        .chain([center])
        .chain(path2.first().copied())
        .collect();
    let length =
        edge1.length + path_length(&connector, &graph.metadata().pixel_size) + edge2.length;

    let mut path = path1;
    path.push(center);
    path.extend(path2);
    let new_edge = graph.add_edge(j.nei1, j.nei2, path, length)?;
    Ok((new_edge, [(j.edge1, edge1), (j.edge2, edge2)]))
}

/// Eliminate a single degree-two node without any cascading.
///
/// Returns the id of the merged edge; its branch flag is set from the
/// current degrees.
///
/// # Errors
///
/// Returns [`GraphError::SelfLoopElimination`] if the node's only edge is
/// a self-loop and [`GraphError::Inconsistent`] if its degree is not 2.
pub fn merge_degree_two_node(
    graph: &mut SkeletonGraph,
    node: NodeId,
) -> Result<EdgeId, GraphError> {
    let j = junction(graph, node)?;
    let (new_edge, _) = merge(graph, node, j)?;
    let is_branch = graph.touches_leaf(new_edge);
    if let Some(e) = graph.edge_mut(new_edge) {
        e.is_branch = is_branch;
    }
    Ok(new_edge)
}

/// Work-list driven elimination state.
struct Eliminator<'g> {
    graph: &'g mut SkeletonGraph,
    threshold: f64,
    stack: Vec<NodeId>,
    changes: BranchChanges,
    eliminated: usize,
}

impl Eliminator<'_> {
    fn run(&mut self) -> Result<(), GraphError> {
        while let Some(node) = self.stack.pop() {
            match degree_two_kind(self.graph, node) {
                Some(DegreeTwoKind::Simple | DegreeTwoKind::Multiple) => self.eliminate(node)?,
                _ => tracing::trace!(node, "node no longer eligible for elimination"),
            }
        }
        Ok(())
    }

    fn eliminate(&mut self, node: NodeId) -> Result<(), GraphError> {
        let j = junction(self.graph, node)?;
        let has_nei_edge = match j.kind {
            DegreeTwoKind::Multiple => {
                // The merged edge becomes a self-loop on the neighbor.
                if self.graph.degree(j.nei1) == 2 {
                    self.stack.retain(|&n| n != j.nei1);
                }
                true
            }
            _ => self.graph.has_edge(j.nei1, j.nei2),
        };

        let (new_edge, removed) = merge(self.graph, node, j)?;
        for (id, edge) in removed {
            if edge.is_branch {
                self.changes.record_removed(id);
            }
        }
        if self.graph.touches_leaf(new_edge) {
            self.flag_branch(new_edge);
        }
        self.eliminated += 1;
        tracing::trace!(node, nei1 = j.nei1, nei2 = j.nei2, new_edge, "eliminated degree-two node");

        if has_nei_edge {
            self.handle_new_multiedge(j.nei1, j.nei2);
        }
        Ok(())
    }

    /// Drop the shortest of the edges between `u` and `v` (self-loops when
    /// `u == v`) when it is short, and propagate the resulting degree
    /// changes.
    fn handle_new_multiedge(&mut self, u: NodeId, v: NodeId) {
        let Some((id, edge)) = remove_small_mul(self.graph, u, v, 2.0 * self.threshold) else {
            return;
        };
        if edge.is_branch {
            self.changes.record_removed(id);
        }
        for n in [u, v] {
            match self.graph.degree(n) {
                2 => self.stack.push(n),
                1 => {
                    self.stack.retain(|&m| m != n);
                    if let Some(&last) = self.graph.incident_edges(n).first() {
                        self.flag_branch(last);
                    }
                }
                _ => {}
            }
        }
    }

    fn flag_branch(&mut self, edge: EdgeId) {
        if let Some(e) = self.graph.edge_mut(edge)
            && !e.is_branch
        {
            e.is_branch = true;
            self.changes.record_added(edge);
        }
    }
}

/// Eliminate every simple degree-two node, cascading as needed.
///
/// The initial work list holds the simple degree-two nodes in ascending
/// id order and is processed last-in first-out. Parallel edges created by
/// a merge are reduced with twice `threshold`.
///
/// Returns the number of eliminated nodes.
///
/// # Errors
///
/// Only fails on an internally inconsistent graph.
pub fn remove_degree_two_nodes(
    graph: &mut SkeletonGraph,
    threshold: f64,
) -> Result<usize, GraphError> {
    let stack: Vec<NodeId> = graph
        .node_ids()
        .filter(|&n| degree_two_kind(graph, n) == Some(DegreeTwoKind::Simple))
        .collect();
    let mut eliminator = Eliminator {
        graph,
        threshold,
        stack,
        changes: BranchChanges::default(),
        eliminated: 0,
    };
    eliminator.run()?;
    tracing::debug!(eliminated = eliminator.eliminated, "removed degree-two nodes");
    Ok(eliminator.eliminated)
}

/// Eliminate `node` (if it is a simple degree-two node) and every
/// degree-two node this uncovers, reporting branch flag changes.
///
/// # Errors
///
/// Only fails on an internally inconsistent graph.
pub fn remove_degree_two_nodes_from(
    graph: &mut SkeletonGraph,
    threshold: f64,
    node: NodeId,
) -> Result<BranchChanges, GraphError> {
    let stack = if degree_two_kind(graph, node) == Some(DegreeTwoKind::Simple) {
        vec![node]
    } else {
        Vec::new()
    };
    let mut eliminator = Eliminator {
        graph,
        threshold,
        stack,
        changes: BranchChanges::default(),
        eliminated: 0,
    };
    eliminator.run()?;
    Ok(eliminator.changes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use crate::measure::add_branch_info;
    use crate::types::{GraphMetadata, PointType};

    fn graph_with_pixel_size(size: f64) -> SkeletonGraph {
        let mut metadata = GraphMetadata::unit(&[64, 64]);
        metadata.pixel_size = vec![size, size];
        SkeletonGraph::new(metadata)
    }

    fn at(g: &mut SkeletonGraph, r: i64, c: i64, kind: PointType) -> NodeId {
        g.add_node(Node::at(Pixel::new_2d(r, c), kind))
    }

    fn row(r: i64, cols: std::ops::Range<i64>) -> Vec<Pixel> {
        cols.map(|c| Pixel::new_2d(r, c)).collect()
    }

    #[test]
    fn classifies_degree_two_nodes() {
        let mut g = graph_with_pixel_size(1.0);
        let a = at(&mut g, 0, 0, PointType::Termination);
        let b = at(&mut g, 0, 5, PointType::Bifurcation);
        let c = at(&mut g, 0, 9, PointType::Termination);
        let d = at(&mut g, 9, 9, PointType::Bifurcation);
        let e = at(&mut g, 9, 0, PointType::Bifurcation);
        g.add_edge(a, b, vec![], 1.0).unwrap();
        g.add_edge(b, c, vec![], 1.0).unwrap();
        g.add_edge(c, d, vec![], 1.0).unwrap();
        g.add_edge(c, d, vec![], 1.0).unwrap();
        g.add_edge(e, e, vec![], 1.0).unwrap();
        assert_eq!(degree_two_kind(&g, a), None);
        assert_eq!(degree_two_kind(&g, b), Some(DegreeTwoKind::Simple));
        assert_eq!(degree_two_kind(&g, d), Some(DegreeTwoKind::Multiple));
        assert_eq!(degree_two_kind(&g, e), Some(DegreeTwoKind::Loop));
        assert_eq!(degree_two_kind(&g, c), None);
    }

    #[test]
    fn merges_a_path_of_three() {
        let mut g = graph_with_pixel_size(0.05);
        let a = at(&mut g, 0, 0, PointType::Termination);
        let b = at(&mut g, 0, 10, PointType::Bifurcation);
        let c = at(&mut g, 0, 20, PointType::Termination);
        g.add_edge(a, b, row(0, 1..10), 3.0).unwrap();
        g.add_edge(b, c, row(0, 11..20), 4.0).unwrap();
        add_branch_info(&mut g);

        assert_eq!(remove_degree_two_nodes(&mut g, 1.0).unwrap(), 1);
        assert_eq!(g.degree(b), 0);
        let edges: Vec<_> = g.edges().collect();
        assert_eq!(edges.len(), 1);
        let (_, edge) = edges[0];
        assert_eq!(edge.endpoints(), (a, c));
        assert!((edge.length - 7.1).abs() <= 7.1 * 1e-9);
        assert_eq!(edge.path, row(0, 1..20));
        assert!(edge.is_branch);
    }

    #[test]
    fn orients_paths_by_node_order() {
        // Middle node has the smallest id, so both stored paths run away
        // from it and the first one must be reversed.
        let mut g = graph_with_pixel_size(1.0);
        let mid = at(&mut g, 0, 5, PointType::Bifurcation);
        let left = at(&mut g, 0, 0, PointType::Termination);
        let right = at(&mut g, 0, 10, PointType::Termination);
        g.add_edge(mid, left, row(0, 1..5).into_iter().rev().collect(), 3.0)
            .unwrap();
        g.add_edge(mid, right, row(0, 6..10), 3.0).unwrap();
        let e = merge_degree_two_node(&mut g, mid).unwrap();
        let edge = g.edge(e).unwrap();
        assert_eq!(edge.endpoints(), (left, right));
        assert_eq!(edge.path, row(0, 1..10));
        assert!(edge.is_contiguous());
        assert!((edge.length - 8.0).abs() < 1e-9);
    }

    #[test]
    fn loop_nodes_cannot_be_merged() {
        let mut g = graph_with_pixel_size(1.0);
        let a = at(&mut g, 0, 0, PointType::Bifurcation);
        g.add_edge(a, a, vec![], 4.0).unwrap();
        assert_eq!(
            merge_degree_two_node(&mut g, a),
            Err(GraphError::SelfLoopElimination { node: a })
        );
        // The work list skips it silently.
        assert_eq!(remove_degree_two_nodes(&mut g, 1.0).unwrap(), 0);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn multiple_node_becomes_a_self_loop() {
        let mut g = graph_with_pixel_size(1.0);
        let hub = at(&mut g, 0, 0, PointType::Bifurcation);
        let leaf = at(&mut g, 20, 0, PointType::Termination);
        let m = at(&mut g, 0, 10, PointType::Bifurcation);
        g.add_edge(hub, leaf, vec![], 30.0).unwrap();
        g.add_edge(hub, m, vec![], 30.0).unwrap();
        g.add_edge(hub, m, vec![], 30.0).unwrap();
        add_branch_info(&mut g);

        let e = merge_degree_two_node(&mut g, m).unwrap();
        assert!(g.edge(e).unwrap().is_self_loop());
        assert_eq!(g.degree(hub), 3);
        assert_eq!(g.degree(m), 0);
        assert!(g.branch_flag_violations().is_empty());
    }

    #[test]
    fn new_short_multiedge_is_reduced_and_cascades() {
        // Triangle x-y-n with a tail on x and on y. Eliminating n creates a
        // second x-y edge; the short one is dropped, leaving x and y with
        // degree 2, which are eliminated in turn.
        let mut g = graph_with_pixel_size(1.0);
        let tail_x = at(&mut g, 0, 0, PointType::Termination);
        let tail_y = at(&mut g, 0, 30, PointType::Termination);
        let x = at(&mut g, 0, 10, PointType::Bifurcation);
        let y = at(&mut g, 0, 20, PointType::Bifurcation);
        let n = at(&mut g, 10, 15, PointType::Bifurcation);
        g.add_edge(tail_x, x, vec![], 50.0).unwrap();
        g.add_edge(y, tail_y, vec![], 50.0).unwrap();
        g.add_edge(x, y, vec![], 1.0).unwrap();
        g.add_edge(x, n, vec![], 40.0).unwrap();
        g.add_edge(n, y, vec![], 40.0).unwrap();
        add_branch_info(&mut g);

        let eliminated = remove_degree_two_nodes(&mut g, 1.0).unwrap();
        assert_eq!(eliminated, 3);
        assert_eq!(g.edge_count(), 1);
        let (_, edge) = g.edges().next().unwrap();
        assert_eq!(edge.endpoints(), (tail_x, tail_y));
        assert!(edge.is_branch);
        assert!(g.branch_flag_violations().is_empty());
        g.check_consistency().unwrap();
    }

    #[test]
    fn short_loop_from_multiple_node_is_dropped() {
        // Eliminating y adds a third h-m edge; one short h-m edge goes,
        // leaving m as a multiple node whose merged loop on h is short too.
        let mut g = graph_with_pixel_size(1.0);
        let tail = at(&mut g, 0, 0, PointType::Termination);
        let h = at(&mut g, 0, 10, PointType::Bifurcation);
        let m = at(&mut g, 0, 12, PointType::Bifurcation);
        let y = at(&mut g, 2, 11, PointType::Bifurcation);
        let keep = g.add_edge(tail, h, vec![], 50.0).unwrap();
        g.add_edge(h, m, vec![], 1.0).unwrap();
        g.add_edge(h, m, vec![], 1.0).unwrap();
        g.add_edge(m, y, vec![], 1.0).unwrap();
        g.add_edge(y, h, vec![], 1.0).unwrap();
        add_branch_info(&mut g);

        assert_eq!(remove_degree_two_nodes(&mut g, 5.0).unwrap(), 2);
        assert_eq!(g.edge_count(), 1);
        assert!(g.contains_edge(keep));
        assert_eq!(g.degree(h), 1);
        assert_eq!(g.degree(m), 0);
        assert!(g.edge(keep).unwrap().is_branch);
        assert!(g.branch_flag_violations().is_empty());
        g.check_consistency().unwrap();
    }

    #[test]
    fn long_parallel_edges_are_kept() {
        let mut g = graph_with_pixel_size(1.0);
        let x = at(&mut g, 0, 0, PointType::Bifurcation);
        let y = at(&mut g, 0, 20, PointType::Bifurcation);
        let n = at(&mut g, 10, 10, PointType::Bifurcation);
        let t1 = at(&mut g, 30, 0, PointType::Termination);
        let t2 = at(&mut g, 30, 20, PointType::Termination);
        g.add_edge(x, t1, vec![], 50.0).unwrap();
        g.add_edge(y, t2, vec![], 50.0).unwrap();
        g.add_edge(x, y, vec![], 25.0).unwrap();
        g.add_edge(x, n, vec![], 20.0).unwrap();
        g.add_edge(n, y, vec![], 20.0).unwrap();
        add_branch_info(&mut g);

        remove_degree_two_nodes(&mut g, 10.0).unwrap();
        assert_eq!(g.edges_between(x, y).len(), 2);
        assert_eq!(g.degree(x), 3);
    }

    #[test]
    fn reports_branch_changes() {
        let mut g = graph_with_pixel_size(1.0);
        let a = at(&mut g, 0, 0, PointType::Termination);
        let b = at(&mut g, 0, 10, PointType::Bifurcation);
        let c = at(&mut g, 0, 20, PointType::Bifurcation);
        let d = at(&mut g, 9, 20, PointType::Termination);
        let f = at(&mut g, 0, 29, PointType::Termination);
        let ab = g.add_edge(a, b, vec![], 2.0).unwrap();
        let bc = g.add_edge(b, c, vec![], 2.0).unwrap();
        g.add_edge(c, d, vec![], 2.0).unwrap();
        g.add_edge(c, f, vec![], 2.0).unwrap();
        add_branch_info(&mut g);

        let changes = remove_degree_two_nodes_from(&mut g, 10.0, b).unwrap();
        assert_eq!(changes.removed, BTreeSet::from([ab]));
        let merged = g.edges_between(a, c);
        assert_eq!(merged.len(), 1);
        assert_eq!(changes.added, BTreeSet::from([merged[0]]));
        assert!(!g.contains_edge(bc));
        assert!(g.branch_flag_violations().is_empty());
    }

    #[test]
    fn non_simple_start_is_a_no_op() {
        let mut g = graph_with_pixel_size(1.0);
        let a = at(&mut g, 0, 0, PointType::Termination);
        let b = at(&mut g, 0, 10, PointType::Termination);
        g.add_edge(a, b, vec![], 2.0).unwrap();
        let changes = remove_degree_two_nodes_from(&mut g, 10.0, a).unwrap();
        assert!(changes.is_empty());
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn added_then_removed_cancels() {
        let mut changes = BranchChanges::default();
        changes.record_added(4);
        changes.record_removed(4);
        changes.record_removed(7);
        assert!(changes.added.is_empty());
        assert_eq!(changes.removed, BTreeSet::from([7]));
    }
}
