//! CLI commands for butterfly-centrality

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::betweenness::{betweenness, EdgeWeight};
use crate::decision;
use crate::graph::{build, DecisionGraph};
use crate::report::{top_edges, top_nodes, CentralityReport, Threshold, THRESHOLD_LEVELS};
use crate::topology::{GraphConfig, RawTopology, RESTRICTED_HIGHWAYS};

#[derive(Parser)]
#[command(name = "butterfly-centrality")]
#[command(about = "Betweenness centrality of OSM road networks", long_about = None)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the decision-point graph and score nodes and edges
    Analyze {
        /// Topology JSON with `nodes` and `ways` tables
        topology: PathBuf,

        /// Edge attribute used as path length
        #[arg(long, value_enum, default_value_t = EdgeWeight::Distance)]
        weight: EdgeWeight,

        /// Number of top nodes and edges to print
        #[arg(long, default_value = "10")]
        top: usize,

        /// Highway classes forming the network (repeatable)
        #[arg(long = "highway", value_name = "TYPE")]
        highways: Vec<String>,

        /// Importance cut-off, `mean` or a fraction of the maximum in [0, 1] (repeatable, default mean)
        #[arg(long = "threshold", value_name = "mean|FRACTION")]
        thresholds: Vec<Threshold>,

        /// Also report the fraction levels 0.10, 0.15, ..., 1.00
        #[arg(long)]
        levels: bool,

        /// Write the full JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Shortest path by distance between two decision points
    Route {
        /// Topology JSON with `nodes` and `ways` tables
        topology: PathBuf,

        /// Start node id
        #[arg(long)]
        from: i64,

        /// Target node id
        #[arg(long)]
        to: i64,

        /// Highway classes forming the network (repeatable)
        #[arg(long = "highway", value_name = "TYPE")]
        highways: Vec<String>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Analyze {
                topology,
                weight,
                top,
                highways,
                thresholds,
                levels,
                output,
            } => {
                let thresholds = importance_thresholds(thresholds, levels);
                run_analyze(
                    &topology,
                    weight,
                    top,
                    &highways,
                    &thresholds,
                    output.as_deref(),
                )
                .map(|_| ())
            }
            Commands::Route {
                topology,
                from,
                to,
                highways,
            } => run_route(&topology, from, to, &highways),
        }
    }
}

fn importance_thresholds(mut thresholds: Vec<Threshold>, levels: bool) -> Vec<Threshold> {
    if levels {
        thresholds.extend(THRESHOLD_LEVELS.iter().map(|&f| Threshold::Fraction(f)));
    } else if thresholds.is_empty() {
        thresholds.push(Threshold::Mean);
    }
    thresholds
}

fn graph_config(highways: &[String]) -> GraphConfig {
    if highways.is_empty() {
        GraphConfig::default()
    } else {
        GraphConfig::with_highway_types(highways.iter().cloned())
    }
}

fn load_graph(path: &Path, highways: &[String]) -> Result<DecisionGraph> {
    let start = Instant::now();
    let mut topology = RawTopology::from_json_file(path)
        .with_context(|| format!("Failed to load topology from {}", path.display()))?;
    info!(
        nodes = topology.nodes.len(),
        ways = topology.ways.len(),
        "Loaded topology"
    );

    let config = graph_config(highways);
    if !highways.is_empty() {
        info!(highways = ?config.highway_types, "Using custom highway classes");
    } else {
        info!(highways = ?RESTRICTED_HIGHWAYS, "Using default highway classes");
    }

    let decision_points = decision::extract_and_flag(&mut topology.nodes, &topology.ways, &config);
    let graph = build(&topology.ways, &topology.nodes, &decision_points, &config)
        .context("Decision graph construction failed")?;
    graph.ensure_non_empty()?;
    info!(
        elapsed_s = start.elapsed().as_secs_f64(),
        "Graph construction complete"
    );
    Ok(graph)
}

/// Build, score, and report
pub fn run_analyze(
    topology: &Path,
    weight: EdgeWeight,
    top: usize,
    highways: &[String],
    thresholds: &[Threshold],
    output: Option<&Path>,
) -> Result<CentralityReport> {
    let mut graph = load_graph(topology, highways)?;

    let start = Instant::now();
    let centrality = betweenness(&graph, weight);
    graph.assign_node_centrality(&centrality.nodes)?;
    graph.assign_edge_centrality(&centrality.edges)?;
    info!(
        elapsed_s = start.elapsed().as_secs_f64(),
        "Betweenness centrality complete"
    );

    let report = CentralityReport::new(&graph, weight, thresholds);
    if let Some(s) = &report.node_summary {
        info!(min = s.min, max = s.max, mean = s.mean, "Node centrality");
    }
    if let Some(s) = &report.edge_summary {
        info!(min = s.min, max = s.max, mean = s.mean, "Edge centrality");
    }

    println!("Top {top} decision points:");
    for node in top_nodes(&graph, top) {
        println!(
            "  {:>12}  ({:.6}, {:.6})  {:.6}",
            node.id, node.lat, node.lon, node.node_bet_centrality
        );
    }
    println!("Top {top} road segments:");
    for edge in top_edges(&graph, top) {
        println!(
            "  {:>12} -> {:<12} way {:<12} {:<12} {:.6}",
            edge.source, edge.target, edge.way_id, edge.way_type, edge.edge_bet_centrality
        );
    }

    for view in &report.importance {
        println!(
            "Threshold {}: {} of {} decision points, {} of {} road segments",
            view.threshold,
            view.nodes.len(),
            graph.node_count(),
            view.edges.len(),
            graph.edge_count()
        );
    }

    if let Some(path) = output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .context("Failed to write report")?;
        info!(path = %path.display(), "Wrote report");
    }

    Ok(report)
}

/// Shortest path between two decision points
pub fn run_route(topology: &Path, from: i64, to: i64, highways: &[String]) -> Result<()> {
    let graph = load_graph(topology, highways)?;

    match graph.shortest_path(from, to)? {
        Some(route) => {
            println!("Distance: {:.0}m ({:.2} km)", route.distance, route.distance / 1000.0);
            println!("Decision points: {}", route.nodes.len());
            let path: Vec<String> = route.nodes.iter().map(i64::to_string).collect();
            println!("Path: {}", path.join(" -> "));
        }
        None => anyhow::bail!("No route from {from} to {to}"),
    }
    Ok(())
}
