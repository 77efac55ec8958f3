//! Graph construction from a skeleton image.

use std::collections::HashMap;

use crate::graph::{Node, NodeId, SkeletonGraph};
use crate::grid::{NeighborGrid, PADDING, Skeleton};
use crate::interest::{add_branches, find_interest_points};
use crate::measure::{add_branch_info, add_length};
use crate::track::track_branches;
use crate::types::{GraphError, GraphMetadata};

/// Build the graph of a binary skeleton image.
///
/// Nodes are terminations and bifurcation regions; edges are the pixel
/// paths between them. Lengths and branch flags are annotated, paths are
/// not yet stitched to node centers (see [`simplify`](crate::simplify)).
///
/// # Errors
///
/// Returns [`GraphError::NonBinarySkeleton`] if the image holds values
/// other than 0 and 1, and any error from [`graph_from_neighbor_grid`].
pub fn create_graph(skeleton: &Skeleton) -> Result<SkeletonGraph, GraphError> {
    skeleton.validate_binary()?;
    let grid = NeighborGrid::from_skeleton(skeleton);
    graph_from_neighbor_grid(&grid, skeleton.metadata(), PADDING)
}

/// Build the graph from precomputed neighbor counts.
///
/// `padding` is subtracted from every coordinate of the result, to undo
/// the border added when the grid was computed (0 if none).
///
/// Interest points without any tracked path are dropped, and the
/// remaining ones get dense ids in detection order. Self-loops whose path
/// is a single pixel are discarded.
///
/// # Errors
///
/// Returns [`GraphError::UnknownBranchEndpoint`] when a tracked path ends
/// on a pixel claimed by no interest point, and
/// [`GraphError::DimensionMismatch`] if the grid and the points disagree.
pub fn graph_from_neighbor_grid(
    grid: &NeighborGrid,
    metadata: GraphMetadata,
    padding: i64,
) -> Result<SkeletonGraph, GraphError> {
    let points = add_branches(find_interest_points(grid), grid)?;
    let tracked = track_branches(&points, grid)?;

    let mut used = vec![false; points.len()];
    for t in &tracked {
        used[t.from] = true;
        used[t.to] = true;
    }

    let mut graph = SkeletonGraph::new(metadata);
    let mut node_of: HashMap<usize, NodeId> = HashMap::new();
    for (idx, point) in points.into_iter().enumerate() {
        if used[idx] {
            node_of.insert(idx, graph.add_node(Node::from(point.unpadded(padding))));
        }
    }

    let mut degenerate = 0_usize;
    for t in tracked {
        if t.from == t.to && t.path.len() == 1 {
            degenerate += 1;
            continue;
        }
        let (Some(&a), Some(&b)) = (node_of.get(&t.from), node_of.get(&t.to)) else {
            return Err(GraphError::Inconsistent(format!(
                "tracked path between unknown points {} and {}",
                t.from, t.to
            )));
        };
        let path = t.path.into_iter().map(|p| p.shifted(padding)).collect();
        graph.add_edge(a, b, path, 0.0)?;
    }

    add_length(&mut graph);
    add_branch_info(&mut graph);
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        degenerate,
        "constructed graph"
    );
    Ok(graph)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Pixel, PointType};

    fn skeleton(rows: &[&str]) -> Skeleton {
        let width = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        Skeleton::new(vec![rows.len(), width], data).unwrap()
    }

    #[test]
    fn empty_image_gives_empty_graph() {
        let g = create_graph(&skeleton(&["....", "....", "...."])).unwrap();
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn non_binary_image_is_rejected() {
        let s = Skeleton::new(vec![1, 3], vec![0, 2, 1]).unwrap();
        assert_eq!(
            create_graph(&s),
            Err(GraphError::NonBinarySkeleton { value: 2 })
        );
    }

    #[test]
    fn isolated_pixels_are_ignored() {
        let g = create_graph(&skeleton(&["#...", "..#.", "...."])).unwrap();
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn line_becomes_one_edge_in_image_coordinates() {
        let g = create_graph(&skeleton(&[".....", ".###.", "....."])).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        let (_, edge) = g.edges().next().unwrap();
        assert_eq!(edge.path, vec![Pixel::new_2d(1, 2)]);
        let centers: Vec<Pixel> = g.nodes().map(|(_, n)| n.center).collect();
        assert_eq!(centers, vec![Pixel::new_2d(1, 1), Pixel::new_2d(1, 3)]);
        assert!(edge.is_branch);
    }

    #[test]
    fn two_pixel_segment_has_no_edge() {
        // Both pixels have a single neighbor and form one termination
        // region without branches, so no path is tracked.
        let g = create_graph(&skeleton(&["##"])).unwrap();
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn y_shape_has_star_topology() {
        let g = create_graph(&skeleton(&[
            "#.....#", //
            ".#...#.", //
            "..#.#..", //
            "...#...", //
            "...#...", //
            "...#...", //
            "...#...",
        ]))
        .unwrap();
        let hubs: Vec<NodeId> = g
            .nodes()
            .filter(|(_, n)| n.kind == PointType::Bifurcation)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(hubs.len(), 1);
        assert_eq!(g.degree(hubs[0]), 3);
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 3);
        g.check_consistency().unwrap();
        assert!(g.branch_flag_violations().is_empty());
        assert!(g.edges().all(|(_, e)| e.is_contiguous()));
    }

    #[test]
    fn pixel_size_scales_lengths() {
        let s = skeleton(&["######"]).with_pixel_size(vec![2.0, 0.5]).unwrap();
        let g = create_graph(&s).unwrap();
        let (_, edge) = g.edges().next().unwrap();
        // Path is columns 1..=4: three horizontal steps of 0.5.
        assert!((edge.length - 1.5).abs() < 1e-12);
    }

    #[test]
    fn ring_without_interest_points_is_dropped() {
        let g = create_graph(&skeleton(&[
            "..#..", //
            ".#.#.", //
            "#...#", //
            ".#.#.", //
            "..#..",
        ]))
        .unwrap();
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn single_pixel_self_loops_are_discarded() {
        // The side pixels of a 3x3 ring have four neighbors and form one
        // bifurcation region; each corner is a one-pixel loop back to it.
        let g = create_graph(&skeleton(&[
            ".....", //
            ".###.", //
            ".#.#.", //
            ".###.", //
            ".....",
        ]))
        .unwrap();
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        let (_, node) = g.nodes().next().unwrap();
        assert_eq!(node.center, Pixel::new_2d(2, 2));
        assert_eq!(node.branches.len(), 4);
    }
}
