//! Decision-point road graphs and betweenness centrality for OpenStreetMap
//! networks.
//!
//! The pipeline reads raw node and way tables, keeps the nodes where a driver
//! has a choice to make, connects them along the restricted highway ways and
//! scores every junction and segment by weighted Brandes betweenness.
//!
//! ```no_run
//! use butterfly_centrality::{betweenness, DecisionGraph, EdgeWeight, GraphConfig, RawTopology};
//!
//! # fn main() -> butterfly_common::Result<()> {
//! let topology = RawTopology::from_json_file("hamburg.json")?;
//! let mut graph = DecisionGraph::from_topology(&topology, &GraphConfig::default())?;
//! let scores = betweenness(&graph, EdgeWeight::Distance);
//! graph.assign_node_centrality(&scores.nodes)?;
//! graph.assign_edge_centrality(&scores.edges)?;
//! # Ok(())
//! # }
//! ```

pub mod betweenness;
pub mod cli;
pub mod decision;
pub mod geo;
pub mod graph;
pub mod report;
pub mod topology;

pub use betweenness::{betweenness, edge_betweenness, node_betweenness, Centrality, EdgeWeight};
pub use graph::{build, DecisionGraph, EdgeView, GraphEdge, GraphNode, Route};
pub use report::{
    important_edges, important_nodes, importance_levels, top_edges, top_nodes, CentralityReport,
    Importance, Summary, Threshold, THRESHOLD_LEVELS,
};
pub use topology::{GraphConfig, RawNode, RawTopology, RawWay, RESTRICTED_HIGHWAYS};
