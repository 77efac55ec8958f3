//! Priority-queue driven removal of short terminal branches.
//!
//! Removing a branch can leave its surviving endpoint with degree 2 (the
//! endpoint is then eliminated, which may create new branches) or with
//! degree 1 (its last edge becomes a branch). The queue is updated
//! incrementally so that it always holds exactly the branch edges
//! shorter than the threshold.

use crate::degree_two::{BranchChanges, remove_degree_two_nodes_from};
use crate::graph::{EdgeId, SkeletonGraph};
use crate::queue::BranchQueue;
use crate::types::GraphError;

/// Incremental branch pruner over a borrowed graph.
///
/// Branch flags must be up to date when the pruner is created.
pub struct BranchPruner<'g> {
    graph: &'g mut SkeletonGraph,
    threshold: f64,
    queue: BranchQueue,
    removed: usize,
}

impl<'g> BranchPruner<'g> {
    /// Seed the queue with every branch edge shorter than `threshold`.
    pub fn new(graph: &'g mut SkeletonGraph, threshold: f64) -> Self {
        let mut queue = BranchQueue::new();
        for (id, edge) in graph.edges() {
            if edge.is_branch && edge.length < threshold {
                queue.push(id, edge.length);
            }
        }
        Self {
            graph,
            threshold,
            queue,
            removed: 0,
        }
    }

    /// Remove the shortest queued branch and repair the neighborhood.
    ///
    /// Returns `false` once the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeNotFound`] if the queue refers to an edge
    /// that is no longer in the graph, or any error from degree-two
    /// elimination.
    pub fn step(&mut self) -> Result<bool, GraphError> {
        let Some((edge_id, length)) = self.queue.pop() else {
            return Ok(false);
        };
        let edge = self.graph.remove_edge(edge_id)?;
        self.removed += 1;
        let (n1, n2) = edge.endpoints();
        tracing::trace!(edge = edge_id, n1, n2, length, "pruned branch");

        let target = if self.graph.degree(n1) == 0 { n2 } else { n1 };
        match self.graph.degree(target) {
            2 => {
                let changes = remove_degree_two_nodes_from(self.graph, self.threshold, target)?;
                self.apply(&changes);
            }
            1 => {
                if let Some(&remaining) = self.graph.incident_edges(target).first()
                    && let Some(e) = self.graph.edge_mut(remaining)
                {
                    e.is_branch = true;
                    if e.length < self.threshold {
                        self.queue.push(remaining, e.length);
                    }
                }
            }
            _ => {}
        }
        Ok(true)
    }

    /// Run until no short branch remains. Returns the number of pruned
    /// branches.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`step`](Self::step).
    pub fn run(mut self) -> Result<usize, GraphError> {
        while self.step()? {}
        Ok(self.removed)
    }

    /// Number of branches pruned so far.
    #[must_use]
    pub const fn removed(&self) -> usize {
        self.removed
    }

    /// The pending queue.
    #[must_use]
    pub const fn queue(&self) -> &BranchQueue {
        &self.queue
    }

    /// Edges breaking the queue invariant: queued edges missing from the
    /// graph, and short branch edges missing from the queue.
    #[must_use]
    pub fn queue_violations(&self) -> Vec<EdgeId> {
        let mut out: Vec<EdgeId> = self
            .queue
            .edges()
            .filter(|&e| !self.graph.contains_edge(e))
            .collect();
        out.extend(
            self.graph
                .edges()
                .filter(|(id, e)| {
                    e.is_branch && e.length < self.threshold && !self.queue.contains(*id)
                })
                .map(|(id, _)| id),
        );
        out.sort_unstable();
        out
    }

    fn apply(&mut self, changes: &BranchChanges) {
        for &id in &changes.removed {
            self.queue.remove(id);
        }
        for &id in &changes.added {
            if let Some(e) = self.graph.edge(id)
                && e.is_branch
                && e.length < self.threshold
            {
                self.queue.push(id, e.length);
            }
        }
    }
}

/// Remove every terminal branch shorter than `threshold`, cascading
/// through degree-two elimination. Returns the number of pruned branches.
///
/// # Errors
///
/// Only fails on an internally inconsistent graph.
pub fn remove_branches(graph: &mut SkeletonGraph, threshold: f64) -> Result<usize, GraphError> {
    let removed = BranchPruner::new(graph, threshold).run()?;
    tracing::debug!(removed, threshold, "pruned short branches");
    Ok(removed)
}
