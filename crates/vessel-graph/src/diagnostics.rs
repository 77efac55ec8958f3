//! Per-stage diagnostics: timing and graph counts.
//!
//! [`process_with_diagnostics`] runs the same stages as
//! [`process`](crate::process) and records how long each one took and
//! what it did to the graph. Time is read through the [`Clock`] trait so
//! the core never touches a platform timer itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adjust::cleanup;
use crate::build::create_graph;
use crate::components::remove_small_graph_components;
use crate::degree_two::remove_degree_two_nodes;
use crate::graph::SkeletonGraph;
use crate::grid::Skeleton;
use crate::measure::{add_branch_info, add_length};
use crate::multiedge::remove_small_mul_all;
use crate::prune::remove_branches;
use crate::stitch::simplify;
use crate::types::{AdjustConfig, GraphError};

/// Source of monotonic time.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDiagnostics {
    /// Graph construction from the skeleton.
    pub construction: StageDiagnostics,
    /// Stitching edge paths to node centers.
    pub stitching: StageDiagnostics,
    /// Length and branch annotation.
    pub annotation: StageDiagnostics,
    /// Short self-loop and parallel edge removal.
    pub multi_edge: StageDiagnostics,
    /// Degree-two node elimination.
    pub degree_two: StageDiagnostics,
    /// Short branch pruning.
    pub pruning: StageDiagnostics,
    /// Small component removal.
    pub components: StageDiagnostics,
    /// Isolated node removal and relabeling.
    pub cleanup: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: GraphSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Graph construction.
    Construction {
        /// Skeleton pixels in the input.
        skeleton_pixels: usize,
        /// Nodes created.
        nodes: usize,
        /// Edges created.
        edges: usize,
    },
    /// Path stitching.
    Stitching {
        /// Pixels added to edge paths.
        added_pixels: usize,
    },
    /// Length and branch annotation.
    Annotation {
        /// Sum of all edge lengths.
        total_length: f64,
        /// Edges touching a degree-1 node.
        branch_edges: usize,
    },
    /// Multi-edge reduction.
    MultiEdge {
        /// Length threshold used.
        threshold: f64,
        /// Removed edges.
        removed_edges: usize,
    },
    /// Degree-two elimination.
    DegreeTwo {
        /// Eliminated nodes.
        eliminated_nodes: usize,
        /// Edges left.
        edges: usize,
    },
    /// Branch pruning.
    Pruning {
        /// Length threshold used.
        threshold: f64,
        /// Pruned branches.
        pruned_branches: usize,
        /// Edges left.
        edges: usize,
    },
    /// Small component removal.
    Components {
        /// Length threshold used.
        threshold: f64,
        /// Removed edges.
        removed_edges: usize,
    },
    /// Node cleanup.
    Cleanup {
        /// Removed nodes.
        removed_nodes: usize,
        /// Whether node ids were made dense.
        relabeled: bool,
    },
}

/// High-level summary counts for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Skeleton image shape.
    pub shape: Vec<usize>,
    /// Nodes right after construction.
    pub initial_nodes: usize,
    /// Edges right after construction.
    pub initial_edges: usize,
    /// Nodes in the result.
    pub final_nodes: usize,
    /// Edges in the result.
    pub final_edges: usize,
    /// Sum of edge lengths in the result.
    pub final_length: f64,
}

/// Run `op` and measure it with `clock`.
fn timed<C: Clock, T>(clock: &C, op: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let out = op();
    (out, clock.elapsed(&start))
}

fn total_path_pixels(graph: &SkeletonGraph) -> usize {
    graph.edges().map(|(_, e)| e.path.len()).sum()
}

/// Run construction, stitching and adjustment, collecting diagnostics.
///
/// The returned graph is the same as [`process`](crate::process) would
/// produce.
///
/// # Errors
///
/// Same as [`process`](crate::process).
pub fn process_with_diagnostics<C: Clock>(
    skeleton: &Skeleton,
    config: &AdjustConfig,
    clock: &C,
) -> Result<(SkeletonGraph, GraphDiagnostics), GraphError> {
    config.validate()?;
    let threshold = config.length_threshold;
    let run_start = clock.now();

    let (graph, duration) = timed(clock, || create_graph(skeleton));
    let mut graph = graph?;
    let construction = StageDiagnostics {
        duration,
        metrics: StageMetrics::Construction {
            skeleton_pixels: skeleton.skeleton_pixel_count(),
            nodes: graph.node_count(),
            edges: graph.edge_count(),
        },
    };
    let initial_nodes = graph.node_count();
    let initial_edges = graph.edge_count();

    let before = total_path_pixels(&graph);
    let (stitched, duration) = timed(clock, || simplify(&graph));
    graph = stitched;
    let stitching = StageDiagnostics {
        duration,
        metrics: StageMetrics::Stitching {
            added_pixels: total_path_pixels(&graph).saturating_sub(before),
        },
    };

    let ((), duration) = timed(clock, || {
        add_length(&mut graph);
        add_branch_info(&mut graph);
    });
    let annotation = StageDiagnostics {
        duration,
        metrics: StageMetrics::Annotation {
            total_length: graph.total_length(),
            branch_edges: graph.edges().filter(|(_, e)| e.is_branch).count(),
        },
    };

    let (removed_edges, duration) = timed(clock, || remove_small_mul_all(&mut graph, 2.0 * threshold));
    let multi_edge = StageDiagnostics {
        duration,
        metrics: StageMetrics::MultiEdge {
            threshold: 2.0 * threshold,
            removed_edges,
        },
    };

    let (eliminated, duration) = timed(clock, || remove_degree_two_nodes(&mut graph, threshold));
    let degree_two = StageDiagnostics {
        duration,
        metrics: StageMetrics::DegreeTwo {
            eliminated_nodes: eliminated?,
            edges: graph.edge_count(),
        },
    };

    let (pruned, duration) = timed(clock, || remove_branches(&mut graph, threshold));
    let pruning = StageDiagnostics {
        duration,
        metrics: StageMetrics::Pruning {
            threshold,
            pruned_branches: pruned?,
            edges: graph.edge_count(),
        },
    };

    let (removed_edges, duration) = timed(clock, || {
        remove_small_graph_components(&mut graph, 2.0 * threshold)
    });
    let components = StageDiagnostics {
        duration,
        metrics: StageMetrics::Components {
            threshold: 2.0 * threshold,
            removed_edges,
        },
    };

    let nodes_before = graph.node_count();
    let (graph, duration) = timed(clock, || cleanup(graph, config));
    let cleanup = StageDiagnostics {
        duration,
        metrics: StageMetrics::Cleanup {
            removed_nodes: nodes_before - graph.node_count(),
            relabeled: !config.keep_nodes && config.collapse_indices,
        },
    };

    let diagnostics = GraphDiagnostics {
        construction,
        stitching,
        annotation,
        multi_edge,
        degree_two,
        pruning,
        components,
        cleanup,
        total_duration: clock.elapsed(&run_start),
        summary: GraphSummary {
            shape: skeleton.shape().to_vec(),
            initial_nodes,
            initial_edges,
            final_nodes: graph.node_count(),
            final_edges: graph.edge_count(),
            final_length: graph.total_length(),
        },
    };
    Ok((graph, diagnostics))
}

impl GraphDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Skeleton Graph Diagnostics\n{}", "=".repeat(60)));
        let shape: Vec<String> = self.summary.shape.iter().map(ToString::to_string).collect();
        lines.push(format!("Image: {}", shape.join("x")));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Construction", &self.construction),
            ("Stitching", &self.stitching),
            ("Annotation", &self.annotation),
            ("Multi-edge Reduction", &self.multi_edge),
            ("Degree-two Elimination", &self.degree_two),
            ("Branch Pruning", &self.pruning),
            ("Small Components", &self.components),
            ("Cleanup", &self.cleanup),
        ];
        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Nodes: {} -> {}  |  Edges: {} -> {}  |  Length: {:.3}",
            self.summary.initial_nodes,
            self.summary.final_nodes,
            self.summary.initial_edges,
            self.summary.final_edges,
            self.summary.final_length,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Construction {
            skeleton_pixels,
            nodes,
            edges,
        } => format!("{skeleton_pixels} pixels -> {nodes} nodes, {edges} edges"),
        StageMetrics::Stitching { added_pixels } => format!("+{added_pixels} path pixels"),
        StageMetrics::Annotation {
            total_length,
            branch_edges,
        } => format!("length={total_length:.3} branches={branch_edges}"),
        StageMetrics::MultiEdge {
            threshold,
            removed_edges,
        }
        | StageMetrics::Components {
            threshold,
            removed_edges,
        } => format!("threshold={threshold:.2} removed={removed_edges}"),
        StageMetrics::DegreeTwo {
            eliminated_nodes,
            edges,
        } => format!("eliminated={eliminated_nodes} edges={edges}"),
        StageMetrics::Pruning {
            threshold,
            pruned_branches,
            edges,
        } => format!("threshold={threshold:.2} pruned={pruned_branches} edges={edges}"),
        StageMetrics::Cleanup {
            removed_nodes,
            relabeled,
        } => {
            if *relabeled {
                format!("removed={removed_nodes} nodes, relabeled")
            } else {
                format!("removed={removed_nodes} nodes")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn y_skeleton() -> Skeleton {
        let rows = [
            "#.......#", //
            ".#.....#.", //
            "..#...#..", //
            "...#.#...", //
            "....#....", //
            "....#....", //
            "....#....", //
            "....#....", //
            "....#....",
        ];
        let data = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        Skeleton::new(vec![rows.len(), rows[0].len()], data).unwrap()
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_match_plain_processing() {
        let skeleton = y_skeleton();
        let config = AdjustConfig::with_threshold(2.0);
        let clock = TickClock { ticks: Cell::new(0) };
        let (graph, diag) = process_with_diagnostics(&skeleton, &config, &clock).unwrap();
        assert_eq!(graph, crate::process(&skeleton, &config).unwrap());

        assert_eq!(diag.summary.initial_nodes, 4);
        assert_eq!(diag.summary.initial_edges, 3);
        assert_eq!(diag.summary.final_edges, graph.edge_count());
        assert!(diag.total_duration >= diag.construction.duration);
        assert!(matches!(
            diag.construction.metrics,
            StageMetrics::Construction { nodes: 4, edges: 3, .. }
        ));
    }

    #[test]
    fn invalid_config_fails_before_any_stage() {
        let clock = TickClock { ticks: Cell::new(0) };
        let result = process_with_diagnostics(
            &y_skeleton(),
            &AdjustConfig::with_threshold(-2.0),
            &clock,
        );
        assert!(matches!(result, Err(GraphError::InvalidConfig(_))));
        assert_eq!(clock.ticks.get(), 0);
    }

    #[test]
    fn report_produces_nonempty_string() {
        let clock = TickClock { ticks: Cell::new(0) };
        let (_, diag) =
            process_with_diagnostics(&y_skeleton(), &AdjustConfig::default(), &clock).unwrap();
        let report = diag.report();
        assert!(report.contains("Skeleton Graph Diagnostics"));
        assert!(report.contains("Branch Pruning"));
        assert!(report.contains("Image: 9x9"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let stage = StageDiagnostics {
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Stitching { added_pixels: 3 },
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-12);
        let back: StageDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"duration": -1.0, "metrics": {"Stitching": {"added_pixels": 0}}}"#;
        assert!(serde_json::from_str::<StageDiagnostics>(json).is_err());
    }
}
