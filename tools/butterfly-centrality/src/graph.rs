//! Decision-point graph construction
//!
//! The graph keeps only decision points as nodes. Every edge stands for travel
//! between two adjacent decision points along a restricted way; the shape
//! points in between are elided.
//!
//! Construction runs in three passes:
//!
//! 1. topology: one node per decision point, edges from the decision-point
//!    subsequence of every restricted way (forward only for `oneway=yes`)
//! 2. attributes: geodesic bearing and distance per directed edge
//! 3. normalization: an edge still missing a distance takes the one of its
//!    reverse edge; bearings are never copied

use butterfly_common::{Error, Result};
use petgraph::algo::{astar, has_path_connecting};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::decision;
use crate::geo::{bearing_and_distance, validate_coordinate};
use crate::topology::{GraphConfig, RawNode, RawTopology, RawWay};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub node_bet_centrality: Option<f64>,
}

impl GraphNode {
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            node_bet_centrality: None,
        }
    }

    pub fn lat_lon(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub way_id: i64,
    /// `highway` value of the way the edge was taken from
    pub way_type: String,
    /// Degrees in [0, 360), specific to the edge direction
    pub bearing: Option<f64>,
    /// Meters
    pub distance: Option<f64>,
    pub edge_bet_centrality: Option<f64>,
}

impl GraphEdge {
    pub fn new(way_id: i64, way_type: impl Into<String>) -> Self {
        Self {
            way_id,
            way_type: way_type.into(),
            bearing: None,
            distance: None,
            edge_bet_centrality: None,
        }
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    fn from_way(way: &RawWay) -> Self {
        Self::new(way.id, way.highway().unwrap_or_default())
    }
}

/// Borrowed view of a directed edge with its endpoint ids
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'a> {
    pub source: i64,
    pub target: i64,
    pub attrs: &'a GraphEdge,
}

/// Shortest path by distance between two decision points
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub distance: f64,
    pub nodes: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    node_map: HashMap<i64, NodeIndex>,
}

impl DecisionGraph {
    /// Extract decision points from `topology` and build the graph over them
    pub fn from_topology(topology: &RawTopology, config: &GraphConfig) -> Result<Self> {
        let decision_points = decision::extract(&topology.ways, config);
        build(&topology.ways, &topology.nodes, &decision_points, config)
    }

    /// Assemble a graph from already derived nodes and directed edges.
    ///
    /// Edge attributes are taken as given; no geodesic pass runs. Edges whose
    /// endpoints are not among `nodes` fail with [`Error::UnknownNode`], a
    /// distance that is not strictly positive with
    /// [`Error::NonPositiveLength`], and a repeated node id with
    /// [`Error::InvalidInput`].
    pub fn from_parts<N, E>(nodes: N, edges: E) -> Result<Self>
    where
        N: IntoIterator<Item = GraphNode>,
        E: IntoIterator<Item = (i64, i64, GraphEdge)>,
    {
        let mut nodes: Vec<GraphNode> = nodes.into_iter().collect();
        nodes.sort_by_key(|n| n.id);
        if let Some(pair) = nodes.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(duplicate_node(pair[0].id));
        }

        let mut graph = DecisionGraph::default();
        for node in nodes {
            validate_coordinate(node.lat, node.lon)?;
            let id = node.id;
            let idx = graph.graph.add_node(node);
            graph.node_map.insert(id, idx);
        }
        for (source, target, edge) in edges {
            if let Some(length) = edge.distance {
                check_length(source, target, length)?;
            }
            let s = graph.index_of(source)?;
            let t = graph.index_of(target)?;
            graph.graph.update_edge(s, t, edge);
        }
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0 && self.graph.edge_count() == 0
    }

    /// Fail with [`Error::EmptyGraph`] when there is nothing to analyze
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            Err(Error::EmptyGraph)
        } else {
            Ok(())
        }
    }

    pub fn contains_node(&self, id: i64) -> bool {
        self.node_map.contains_key(&id)
    }

    pub fn node(&self, id: i64) -> Option<&GraphNode> {
        self.node_map.get(&id).map(|&idx| &self.graph[idx])
    }

    pub fn edge(&self, source: i64, target: i64) -> Option<&GraphEdge> {
        let e = self.find_edge(source, target)?;
        Some(&self.graph[e])
    }

    pub fn has_edge(&self, source: i64, target: i64) -> bool {
        self.find_edge(source, target).is_some()
    }

    /// Nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.graph.node_weights()
    }

    /// Edges in construction order
    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        self.graph.edge_references().map(|e| EdgeView {
            source: self.graph[e.source()].id,
            target: self.graph[e.target()].id,
            attrs: e.weight(),
        })
    }

    pub fn successors(&self, id: i64) -> Result<Vec<i64>> {
        self.neighbor_ids(id, Direction::Outgoing)
    }

    pub fn predecessors(&self, id: i64) -> Result<Vec<i64>> {
        self.neighbor_ids(id, Direction::Incoming)
    }

    /// Shortest path keyed on edge distance.
    ///
    /// Returns `Ok(None)` when `to` is unreachable from `from`.
    pub fn shortest_path(&self, from: i64, to: i64) -> Result<Option<Route>> {
        let start = self.index_of(from)?;
        let goal = self.index_of(to)?;

        let found = astar(
            &self.graph,
            start,
            |n| n == goal,
            |e| e.weight().distance.unwrap_or(1.0),
            |_| 0.0,
        );

        Ok(found.map(|(distance, path)| Route {
            distance,
            nodes: path.into_iter().map(|idx| self.graph[idx].id).collect(),
        }))
    }

    pub fn has_path(&self, from: i64, to: i64) -> Result<bool> {
        let start = self.index_of(from)?;
        let goal = self.index_of(to)?;
        Ok(has_path_connecting(&self.graph, start, goal, None))
    }

    /// Store node betweenness scores. Nodes absent from `scores` get 0.
    pub fn assign_node_centrality(&mut self, scores: &HashMap<i64, f64>) -> Result<()> {
        if self
            .graph
            .node_weights()
            .any(|n| n.node_bet_centrality.is_some())
        {
            return Err(Error::CentralityAlreadyAssigned("Node"));
        }
        for node in self.graph.node_weights_mut() {
            node.node_bet_centrality = Some(scores.get(&node.id).copied().unwrap_or(0.0));
        }
        Ok(())
    }

    /// Store edge betweenness scores keyed by (source, target). Missing edges get 0.
    pub fn assign_edge_centrality(&mut self, scores: &HashMap<(i64, i64), f64>) -> Result<()> {
        if self
            .graph
            .edge_weights()
            .any(|e| e.edge_bet_centrality.is_some())
        {
            return Err(Error::CentralityAlreadyAssigned("Edge"));
        }
        for e in self.graph.edge_indices() {
            let Some((s, t)) = self.graph.edge_endpoints(e) else {
                continue;
            };
            let key = (self.graph[s].id, self.graph[t].id);
            self.graph[e].edge_bet_centrality = Some(scores.get(&key).copied().unwrap_or(0.0));
        }
        Ok(())
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, GraphEdge> {
        &self.graph
    }

    fn index_of(&self, id: i64) -> Result<NodeIndex> {
        self.node_map.get(&id).copied().ok_or(Error::UnknownNode(id))
    }

    fn find_edge(&self, source: i64, target: i64) -> Option<EdgeIndex> {
        let s = *self.node_map.get(&source)?;
        let t = *self.node_map.get(&target)?;
        self.graph.find_edge(s, t)
    }

    fn neighbor_ids(&self, id: i64, dir: Direction) -> Result<Vec<i64>> {
        let idx = self.index_of(id)?;
        let mut ids: Vec<i64> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn add_node(&mut self, raw: &RawNode) -> Result<()> {
        validate_coordinate(raw.lat, raw.lon)?;
        let idx = self.graph.add_node(GraphNode::new(raw.id, raw.lat, raw.lon));
        self.node_map.insert(raw.id, idx);
        Ok(())
    }

    /// Add the consecutive edges of `path`. An existing directed pair takes
    /// the attributes of the later way.
    fn add_path(&mut self, path: &[NodeIndex], way: &RawWay) {
        for pair in path.windows(2) {
            self.graph
                .update_edge(pair[0], pair[1], GraphEdge::from_way(way));
        }
    }

    /// Geodesic attributes for every directed edge, seen from each node
    /// towards the union of its successors and predecessors.
    fn assign_geodesics(&mut self) -> Result<()> {
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();

        for u in indices {
            let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_undirected(u).collect();
            neighbors.sort_unstable();
            neighbors.dedup();

            for v in neighbors {
                let inv = bearing_and_distance(self.graph[u].lat_lon(), self.graph[v].lat_lon())?;
                check_length(self.graph[u].id, self.graph[v].id, inv.distance)?;

                if let Some(e) = self.graph.find_edge(u, v) {
                    let edge = &mut self.graph[e];
                    edge.bearing = Some(inv.forward_azimuth);
                    edge.distance = Some(inv.distance);
                } else if let Some(e) = self.graph.find_edge(v, u) {
                    // v -> u gets its bearing when v is visited
                    let edge = &mut self.graph[e];
                    if edge.distance.is_none() {
                        edge.distance = Some(inv.distance);
                    }
                }
            }
        }
        Ok(())
    }

    /// Copy the distance of the reverse edge onto edges that lack one
    fn normalize_distances(&mut self) {
        let missing: Vec<EdgeIndex> = self
            .graph
            .edge_indices()
            .filter(|&e| self.graph[e].distance.is_none())
            .collect();

        for e in missing {
            let Some((s, t)) = self.graph.edge_endpoints(e) else {
                continue;
            };
            let reverse = self
                .graph
                .find_edge(t, s)
                .and_then(|rev| self.graph[rev].distance);
            if let Some(distance) = reverse {
                self.graph[e].distance = Some(distance);
            }
        }
    }
}

/// Build the decision-point graph.
///
/// Fails without returning a partial graph when a restricted way is empty or
/// references an unknown node, when a node id appears twice, when a decision
/// point has an invalid coordinate, or when two adjacent decision points share
/// a coordinate (zero-length edge). The result does not depend on the order of
/// `ways` or `nodes`.
pub fn build(
    ways: &[RawWay],
    nodes: &[RawNode],
    decision_points: &HashSet<i64>,
    config: &GraphConfig,
) -> Result<DecisionGraph> {
    let mut node_lookup: HashMap<i64, &RawNode> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if node_lookup.insert(node.id, node).is_some() {
            return Err(duplicate_node(node.id));
        }
    }

    let mut restricted: Vec<&RawWay> = ways.iter().filter(|w| config.is_restricted(w)).collect();
    restricted.sort_by_key(|w| w.id);
    validate_ways(&restricted, &node_lookup)?;

    let mut dp_ids: Vec<i64> = decision_points.iter().copied().collect();
    dp_ids.sort_unstable();

    let mut graph = DecisionGraph {
        graph: DiGraph::with_capacity(dp_ids.len(), dp_ids.len() * 2),
        node_map: HashMap::with_capacity(dp_ids.len()),
    };

    for id in dp_ids {
        let raw = node_lookup.get(&id).ok_or_else(|| {
            Error::InvalidInput(format!("Decision point {id} is not a known node"))
        })?;
        graph.add_node(raw)?;
    }

    for way in restricted {
        let mut path: Vec<NodeIndex> = way
            .refs
            .iter()
            .filter_map(|id| graph.node_map.get(id).copied())
            .collect();
        path.dedup();

        if path.len() < 2 {
            debug!(way_id = way.id, "Way has fewer than two decision points");
            continue;
        }

        graph.add_path(&path, way);
        if !way.is_oneway() {
            path.reverse();
            graph.add_path(&path, way);
        }
    }

    graph.assign_geodesics()?;
    graph.normalize_distances();

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Built decision graph"
    );

    Ok(graph)
}

fn duplicate_node(id: i64) -> Error {
    Error::InvalidInput(format!("Node {id} appears more than once"))
}

/// Dijkstra-based path counting needs every edge to be strictly longer than zero
fn check_length(from: i64, to: i64, length: f64) -> Result<()> {
    if length > 0.0 && length.is_finite() {
        Ok(())
    } else {
        Err(Error::NonPositiveLength { from, to, length })
    }
}

fn validate_ways(ways: &[&RawWay], nodes: &HashMap<i64, &RawNode>) -> Result<()> {
    for way in ways {
        if way.refs.is_empty() {
            return Err(Error::EmptyWay { way_id: way.id });
        }
        if let Some(&node_id) = way.refs.iter().find(|id| !nodes.contains_key(id)) {
            return Err(Error::MissingNode {
                way_id: way.id,
                node_id,
            });
        }
    }
    Ok(())
}
