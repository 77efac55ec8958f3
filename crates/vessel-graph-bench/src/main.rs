//! vessel-graph-bench: CLI tool for skeleton graph experimentation and
//! diagnostics.
//!
//! Loads a skeleton (a raster image, or a JSON serialized
//! `vessel_graph::Skeleton` for 3D data), builds and simplifies its graph
//! with configurable parameters, and prints per-stage diagnostics.
//! Useful for:
//!
//! - Tuning the branch length threshold
//! - Measuring per-stage durations to identify bottlenecks
//! - Dumping the resulting graph as JSON for inspection
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin vessel-graph-bench -- [OPTIONS] <INPUT_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vessel_graph::diagnostics::{Clock, GraphDiagnostics};
use vessel_graph::{AdjustConfig, Skeleton};

/// Skeleton graph construction and simplification diagnostics.
///
/// Builds the graph of a binary skeleton image, simplifies it and prints
/// detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "vessel-graph-bench", version)]
struct Cli {
    /// Path to the input skeleton: an image (PNG, BMP, TIFF; any non-zero
    /// pixel is skeleton) or a `.json` serialized skeleton.
    input_path: PathBuf,

    /// Branch length threshold in physical units.
    #[arg(long, default_value_t = AdjustConfig::DEFAULT_LENGTH_THRESHOLD)]
    threshold: f64,

    /// Keep nodes left without edges.
    #[arg(long)]
    keep_nodes: bool,

    /// Keep the original node ids instead of renumbering them densely.
    #[arg(long)]
    no_collapse: bool,

    /// Physical pixel size per axis, comma separated (e.g. `0.5,0.5`).
    ///
    /// Overrides the pixel size stored in a JSON skeleton.
    #[arg(long, value_delimiter = ',')]
    pixel_size: Option<Vec<f64>>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Write the resulting graph as JSON to this file.
    #[arg(long)]
    graph_json: Option<PathBuf>,

    /// Full adjustment config as a JSON string.
    ///
    /// When provided, `--threshold`, `--keep-nodes` and `--no-collapse`
    /// are ignored. The JSON must be a valid `AdjustConfig`
    /// serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build an [`AdjustConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<AdjustConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        AdjustConfig {
            length_threshold: cli.threshold,
            keep_nodes: cli.keep_nodes,
            collapse_indices: !cli.no_collapse,
        }
    };
    config
        .validate()
        .map_err(|e| format!("Invalid config: {e}"))?;
    Ok(config)
}

/// Load the skeleton at `path`, choosing the format from its extension.
fn load_skeleton(path: &Path, pixel_size: Option<&[f64]>) -> Result<Skeleton, String> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let skeleton = if is_json {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        serde_json::from_str::<Skeleton>(&text)
            .map_err(|e| format!("Error parsing skeleton {}: {e}", path.display()))?
    } else {
        let img = image::open(path)
            .map_err(|e| format!("Error decoding {}: {e}", path.display()))?
            .to_luma8();
        Skeleton::from_gray_image(&img)
    };
    let skeleton = if skeleton.source().is_empty() {
        skeleton.with_source(path.display().to_string())
    } else {
        skeleton
    };

    match pixel_size {
        Some(size) => skeleton
            .with_pixel_size(size.to_vec())
            .map_err(|e| format!("Error applying --pixel-size: {e}")),
        None => Ok(skeleton),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "vessel_graph=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let skeleton = match load_skeleton(&cli.input_path, cli.pixel_size.as_deref()) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        path = %cli.input_path.display(),
        shape = ?skeleton.shape(),
        skeleton_pixels = skeleton.skeleton_pixel_count(),
        "loaded skeleton"
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match vessel_graph::diagnostics::process_with_diagnostics(&skeleton, &config, &StdClock) {
            Ok((graph, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the graph on the first run only.
                if run == 0
                    && let Some(ref graph_path) = cli.graph_json
                {
                    let written = serde_json::to_string_pretty(&graph)
                        .map_err(|e| e.to_string())
                        .and_then(|json| {
                            std::fs::write(graph_path, &json)
                                .map(|()| json.len())
                                .map_err(|e| e.to_string())
                        });
                    match written {
                        Ok(bytes) => {
                            eprintln!(
                                "Graph written to {} ({bytes} bytes)",
                                graph_path.display(),
                            );
                        }
                        Err(e) => {
                            eprintln!("Error writing graph to {}: {e}", graph_path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&GraphDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[GraphDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Construction", |d| d.construction.duration),
        ("Stitching", |d| d.stitching.duration),
        ("Annotation", |d| d.annotation.duration),
        ("Multi-edge Reduction", |d| d.multi_edge.duration),
        ("Degree-two Elimination", |d| d.degree_two.duration),
        ("Branch Pruning", |d| d.pruning.duration),
        ("Small Components", |d| d.components.duration),
        ("Cleanup", |d| d.cleanup.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
