//! Undirected multigraph of interest points connected by pixel paths.
//!
//! Self-loops and parallel edges are allowed. Node and edge ids are
//! allocated sequentially and never reused, so an id that has been
//! removed can safely be used as a tombstone key by callers (the pruning
//! queue relies on this).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::interest::InterestPoint;
use crate::types::{GraphError, GraphMetadata, Pixel, PointType};

/// Node identifier.
pub type NodeId = usize;
/// Edge identifier.
pub type EdgeId = usize;

/// A graph node: one termination or bifurcation region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Pixels composing the region.
    pub pixels: Vec<Pixel>,
    /// Representative pixel.
    pub center: Pixel,
    /// Termination or bifurcation.
    pub kind: PointType,
    /// Two-neighbor pixels where the node's paths begin.
    pub branches: Vec<Pixel>,
    /// Image dimensionality.
    pub ndim: usize,
    /// Id before the last dense relabeling, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_id: Option<NodeId>,
}

impl Node {
    /// Single-pixel node, mostly useful for building graphs by hand.
    #[must_use]
    pub fn at(center: Pixel, kind: PointType) -> Self {
        Self {
            pixels: vec![center],
            center,
            kind,
            branches: Vec::new(),
            ndim: center.ndim(),
            old_id: None,
        }
    }
}

impl From<InterestPoint> for Node {
    fn from(point: InterestPoint) -> Self {
        Self {
            pixels: point.pixels().to_vec(),
            center: point.center(),
            kind: point.kind(),
            branches: point.branches().to_vec(),
            ndim: point.ndim(),
            old_id: None,
        }
    }
}

/// A graph edge: the pixel path between two nodes.
///
/// Endpoints are stored with `a <= b` and `path` runs from `a`'s side to
/// `b`'s side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    a: NodeId,
    b: NodeId,
    /// Pixels from `a`'s side to `b`'s side.
    pub path: Vec<Pixel>,
    /// Physical arc length of `path`.
    pub length: f64,
    /// Whether the edge touches a degree-1 node.
    pub is_branch: bool,
}

impl Edge {
    /// Smaller endpoint.
    #[must_use]
    pub const fn a(&self) -> NodeId {
        self.a
    }

    /// Larger endpoint.
    #[must_use]
    pub const fn b(&self) -> NodeId {
        self.b
    }

    /// Both endpoints, smaller first.
    #[must_use]
    pub const fn endpoints(&self) -> (NodeId, NodeId) {
        (self.a, self.b)
    }

    /// Returns `true` if both endpoints are the same node.
    #[must_use]
    pub const fn is_self_loop(&self) -> bool {
        self.a == self.b
    }

    /// The endpoint opposite to `node` (`node` itself for a self-loop).
    #[must_use]
    pub const fn opposite(&self, node: NodeId) -> NodeId {
        if self.a == node { self.b } else { self.a }
    }

    /// Returns `true` if consecutive path pixels are all grid-adjacent.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.path.windows(2).all(|w| w[0].is_adjacent(&w[1]))
    }
}

/// The skeleton graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonGraph {
    metadata: GraphMetadata,
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    /// Incident edge ids per node; self-loops appear twice.
    incident: BTreeMap<NodeId, Vec<EdgeId>>,
    next_node: NodeId,
    next_edge: EdgeId,
}

impl SkeletonGraph {
    /// Create an empty graph.
    #[must_use]
    pub const fn new(metadata: GraphMetadata) -> Self {
        Self {
            metadata,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            incident: BTreeMap::new(),
            next_node: 0,
            next_edge: 0,
        }
    }

    /// Graph-level metadata.
    #[must_use]
    pub const fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    /// Insert a node and return its id.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(id, node);
        self.incident.insert(id, Vec::new());
        id
    }

    /// Insert an edge between `a` and `b` whose `path` runs from `a` to `b`.
    ///
    /// If `a > b` the endpoints are swapped and the path reversed. The
    /// new edge is not a branch until flagged.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if either endpoint is missing.
    pub fn add_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        mut path: Vec<Pixel>,
        length: f64,
    ) -> Result<EdgeId, GraphError> {
        for n in [a, b] {
            if !self.nodes.contains_key(&n) {
                return Err(GraphError::NodeNotFound(n));
            }
        }
        let (a, b) = if a > b {
            path.reverse();
            (b, a)
        } else {
            (a, b)
        };

        let id = self.next_edge;
        self.next_edge += 1;
        self.edges.insert(
            id,
            Edge {
                a,
                b,
                path,
                length,
                is_branch: false,
            },
        );
        self.incident.entry(a).or_default().push(id);
        self.incident.entry(b).or_default().push(id);
        Ok(id)
    }

    /// Remove an edge and return it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeNotFound`] if the edge does not exist.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, GraphError> {
        let edge = self.edges.remove(&id).ok_or(GraphError::EdgeNotFound(id))?;
        for n in [edge.a, edge.b] {
            if let Some(list) = self.incident.get_mut(&n)
                && let Some(pos) = list.iter().position(|&e| e == id)
            {
                list.remove(pos);
            }
        }
        Ok(edge)
    }

    /// Remove a node together with all its incident edges.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let node = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))?;
        for edge_id in self.incident.remove(&id).unwrap_or_default() {
            if let Some(edge) = self.edges.remove(&edge_id) {
                let other = edge.opposite(id);
                if let Some(list) = self.incident.get_mut(&other) {
                    list.retain(|&e| e != edge_id);
                }
            }
        }
        Ok(node)
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Look up a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Look up an edge.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Look up an edge mutably. Endpoints cannot be changed.
    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    /// Returns `true` if the node exists.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns `true` if the edge exists.
    #[must_use]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// Number of edge endpoints at `node` (self-loops count twice).
    /// Missing nodes have degree 0.
    #[must_use]
    pub fn degree(&self, node: NodeId) -> usize {
        self.incident.get(&node).map_or(0, Vec::len)
    }

    /// Incident edge ids of `node` in ascending order, self-loops listed
    /// twice.
    #[must_use]
    pub fn incident_edges(&self, node: NodeId) -> &[EdgeId] {
        self.incident.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Distinct neighbors of `node` in ascending order. A node with a
    /// self-loop is its own neighbor.
    #[must_use]
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .incident_edges(node)
            .iter()
            .filter_map(|e| self.edges.get(e))
            .map(|e| e.opposite(node))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Ids of the edges joining `u` and `v`, in ascending order.
    #[must_use]
    pub fn edges_between(&self, u: NodeId, v: NodeId) -> Vec<EdgeId> {
        let (a, b) = if u <= v { (u, v) } else { (v, u) };
        let mut out: Vec<EdgeId> = self
            .incident_edges(a)
            .iter()
            .copied()
            .filter(|e| self.edges.get(e).is_some_and(|e| e.b == b && e.a == a))
            .collect();
        out.dedup();
        out
    }

    /// Returns `true` if at least one edge joins `u` and `v`.
    #[must_use]
    pub fn has_edge(&self, u: NodeId, v: NodeId) -> bool {
        !self.edges_between(u, v).is_empty()
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Edge ids in ascending order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys().copied()
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(&id, n)| (id, n))
    }

    /// Edges in ascending id order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().map(|(&id, e)| (id, e))
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Sum of all edge lengths.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.edges.values().map(|e| e.length).sum()
    }

    /// Ids of all self-loop edges.
    #[must_use]
    pub fn self_loops(&self) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|(_, e)| e.is_self_loop())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Whether `edge` should be flagged as a branch given the current
    /// degrees. Missing edges are never branches.
    #[must_use]
    pub fn touches_leaf(&self, edge: EdgeId) -> bool {
        self.edges
            .get(&edge)
            .is_some_and(|e| self.degree(e.a) == 1 || self.degree(e.b) == 1)
    }

    /// Edges whose `is_branch` flag disagrees with the current degrees.
    #[must_use]
    pub fn branch_flag_violations(&self) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|&(&id, e)| e.is_branch != self.touches_leaf(id))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Verify the structural invariants: endpoints exist and are ordered,
    /// the incidence index matches the edge table, and ids are below the
    /// allocation counters.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Inconsistent`] describing the first problem.
    pub fn check_consistency(&self) -> Result<(), GraphError> {
        let mut expected: BTreeMap<NodeId, Vec<EdgeId>> =
            self.nodes.keys().map(|&n| (n, Vec::new())).collect();
        for (&id, edge) in &self.edges {
            if id >= self.next_edge {
                return Err(GraphError::Inconsistent(format!(
                    "edge {id} beyond allocation counter"
                )));
            }
            if edge.a > edge.b {
                return Err(GraphError::Inconsistent(format!(
                    "edge {id} endpoints out of order"
                )));
            }
            for n in [edge.a, edge.b] {
                expected
                    .get_mut(&n)
                    .ok_or_else(|| {
                        GraphError::Inconsistent(format!("edge {id} references missing node {n}"))
                    })?
                    .push(id);
            }
        }
        if let Some(&max) = self.nodes.keys().next_back()
            && max >= self.next_node
        {
            return Err(GraphError::Inconsistent(format!(
                "node {max} beyond allocation counter"
            )));
        }
        if self.incident.len() != self.nodes.len() {
            return Err(GraphError::Inconsistent(
                "incidence index and node table differ".to_string(),
            ));
        }
        for (node, mut edges) in expected {
            let mut actual = self.incident.get(&node).cloned().unwrap_or_default();
            actual.sort_unstable();
            edges.sort_unstable();
            if actual != edges {
                return Err(GraphError::Inconsistent(format!(
                    "incidence of node {node} does not match its edges"
                )));
            }
        }
        Ok(())
    }

    /// Rebuild a graph from explicit ids, validating every reference.
    fn from_parts(
        metadata: GraphMetadata,
        nodes: Vec<(NodeId, Node)>,
        edges: Vec<(EdgeId, Edge)>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new(metadata);
        for (id, node) in nodes {
            if graph.nodes.insert(id, node).is_some() {
                return Err(GraphError::Inconsistent(format!("duplicate node id {id}")));
            }
            graph.incident.insert(id, Vec::new());
            graph.next_node = graph.next_node.max(id + 1);
        }
        for (id, edge) in edges {
            if edge.a > edge.b {
                return Err(GraphError::Inconsistent(format!(
                    "edge {id} endpoints out of order"
                )));
            }
            for n in [edge.a, edge.b] {
                graph
                    .incident
                    .get_mut(&n)
                    .ok_or(GraphError::NodeNotFound(n))?
                    .push(id);
            }
            if graph.edges.insert(id, edge).is_some() {
                return Err(GraphError::Inconsistent(format!("duplicate edge id {id}")));
            }
            graph.next_edge = graph.next_edge.max(id + 1);
        }
        for list in graph.incident.values_mut() {
            list.sort_unstable();
        }
        Ok(graph)
    }
}

/// Serde-compatible proxy for `SkeletonGraph`.
///
/// Nodes and edges are stored as id-tagged lists; the incidence index is
/// rebuilt on deserialization.
#[derive(Serialize, Deserialize)]
struct SkeletonGraphProxy {
    metadata: GraphMetadata,
    nodes: Vec<(NodeId, Node)>,
    edges: Vec<(EdgeId, Edge)>,
}

impl Serialize for SkeletonGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = SkeletonGraphProxy {
            metadata: self.metadata.clone(),
            nodes: self.nodes().map(|(id, n)| (id, n.clone())).collect(),
            edges: self.edges().map(|(id, e)| (id, e.clone())).collect(),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SkeletonGraph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = SkeletonGraphProxy::deserialize(deserializer)?;
        Self::from_parts(proxy.metadata, proxy.nodes, proxy.edges)
            .map_err(serde::de::Error::custom)
    }
}
