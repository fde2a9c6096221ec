//! Error types for the butterfly-osm toolkit
//!
//! Construction errors carry the offending way or node id so that data
//! quality problems can be fixed upstream in the extract.

use thiserror::Error;

/// Main error type for butterfly-osm graph operations
#[derive(Debug, Error)]
pub enum Error {
    /// Coordinate outside the valid latitude/longitude range
    #[error("Invalid coordinate (lat {lat}, lon {lon}): latitude must be in [-90, 90] and longitude in [-180, 180]")]
    Geodesic { lat: f64, lon: f64 },

    /// A way references a node id that is not part of the topology
    #[error("Way {way_id} references unknown node {node_id}")]
    MissingNode { way_id: i64, node_id: i64 },

    /// A way without any node reference
    #[error("Way {way_id} has no node references")]
    EmptyWay { way_id: i64 },

    /// Shortest-path counting requires strictly positive edge lengths
    #[error("Edge {from} -> {to} has length {length}; edge lengths must be positive")]
    NonPositiveLength { from: i64, to: i64, length: f64 },

    /// A non-empty graph was required but none was supplied
    #[error("Graph has no nodes and no edges")]
    EmptyGraph,

    /// Query for a node id that is not a graph node
    #[error("Node {0} is not part of the graph")]
    UnknownNode(i64),

    /// Centrality scores are written once per graph
    #[error("{0} centrality has already been assigned to this graph")]
    CentralityAlreadyAssigned(&'static str),

    /// Invalid configuration or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed JSON topology or report
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Convenience result type for butterfly-osm operations
pub type Result<T> = std::result::Result<T, Error>;
