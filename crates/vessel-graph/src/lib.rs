//! vessel-graph: Skeleton-to-graph conversion and topology simplification
//! (sans-IO).
//!
//! Turns a binary skeleton image (2D or 3D) into an undirected multigraph
//! whose nodes are terminations and bifurcation regions and whose edges
//! are the pixel paths between them, then simplifies it:
//! stitching -> length annotation -> multi-edge reduction ->
//! degree-two elimination -> branch pruning -> small component removal ->
//! node cleanup.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! arrays and returns structured data. Loading images from disk lives in
//! `vessel-graph-bench`.

pub mod adjust;
pub mod build;
pub mod components;
pub mod degree_two;
pub mod diagnostics;
pub mod graph;
pub mod grid;
pub mod interest;
pub mod line;
pub mod measure;
pub mod multiedge;
pub mod prune;
pub mod queue;
pub mod stitch;
pub mod track;
pub mod types;

pub use adjust::adjust_graph;
pub use build::{create_graph, graph_from_neighbor_grid};
pub use graph::{Edge, EdgeId, Node, NodeId, SkeletonGraph};
pub use grid::{NeighborGrid, Skeleton};
pub use stitch::simplify;
pub use types::{AdjustConfig, GraphError, GraphMetadata, Pixel, PointType};

/// Run the full pipeline on a skeleton image.
///
/// # Pipeline steps
///
/// 1. Build the graph ([`create_graph`])
/// 2. Stitch edge paths to node centers ([`simplify`])
/// 3. Simplify the topology ([`adjust_graph`])
///
/// # Errors
///
/// Returns [`GraphError::NonBinarySkeleton`] if the image is not binary,
/// [`GraphError::InvalidConfig`] if `config` does not validate, and any
/// construction error from [`create_graph`].
pub fn process(skeleton: &Skeleton, config: &AdjustConfig) -> Result<SkeletonGraph, GraphError> {
    config.validate()?;
    let graph = create_graph(skeleton)?;
    let stitched = simplify(&graph);
    adjust_graph(&stitched, config)
}
