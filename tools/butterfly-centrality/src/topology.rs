//! Raw OSM topology: nodes and tagged ways as handed over by a parser
//!
//! The records mirror the node/way/tag elements of an OSM extract. They are
//! consumed by the decision-point extractor and the graph builder, then
//! discarded.

use butterfly_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Highway classes that take part in the decision-point graph
pub const RESTRICTED_HIGHWAYS: [&str; 6] = [
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "residential",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Set by `decision::extract_and_flag`; the pure `decision::extract` leaves it untouched
    #[serde(default)]
    pub is_decision_point: bool,
}

impl RawNode {
    pub fn new(id: i64, lon: f64, lat: f64) -> Self {
        Self {
            id,
            lon,
            lat,
            tags: HashMap::new(),
            is_decision_point: false,
        }
    }

    /// (lat, lon) pair as used by the geodesic calculator
    pub fn lat_lon(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWay {
    pub id: i64,
    /// Ordered node references
    pub refs: Vec<i64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl RawWay {
    pub fn new(id: i64, refs: Vec<i64>) -> Self {
        Self {
            id,
            refs,
            tags: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn highway(&self) -> Option<&str> {
        self.tag("highway")
    }

    /// Only the literal `oneway=yes` restricts travel to the way's node order
    pub fn is_oneway(&self) -> bool {
        self.tag("oneway") == Some("yes")
    }
}

/// Highway filter selecting which ways build the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub highway_types: HashSet<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            highway_types: RESTRICTED_HIGHWAYS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GraphConfig {
    pub fn with_highway_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            highway_types: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_restricted(&self, way: &RawWay) -> bool {
        way.highway()
            .is_some_and(|hw| self.highway_types.contains(hw))
    }
}

/// Parsed node and way tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTopology {
    pub nodes: Vec<RawNode>,
    pub ways: Vec<RawWay>,
}

impl RawTopology {
    pub fn new(nodes: Vec<RawNode>, ways: Vec<RawWay>) -> Self {
        Self { nodes, ways }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
