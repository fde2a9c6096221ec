//! Betweenness centrality via Brandes' algorithm.
//!
//! # Overview
//!
//! Betweenness centrality measures how often a node (or an edge) lies on
//! shortest paths between other pairs of nodes. On a road network the high
//! scores mark the junctions and segments most traffic would pass through.
//!
//! # Algorithm
//!
//! Brandes (2001) generalized to weighted directed graphs:
//!
//! 1. For each source node `s`, run Dijkstra and record, per reached node,
//!    the number of shortest paths `sigma` and the predecessor edges lying on
//!    shortest paths.
//! 2. Pop nodes in reverse order of settlement (farthest first) and hand each
//!    node's dependency to its predecessors in proportion to their share of
//!    `sigma`. The share handed over an edge is that edge's dependency.
//! 3. Sum over all sources.
//!
//! Sources are independent, so they are spread across rayon workers. Each
//! worker keeps its own accumulators, summed at the end.
//!
//! Edge lengths are strictly positive (the graph constructors reject
//! anything else), so a settled node is never reached again at equal
//! distance and the shortest-path DAG is acyclic.
//!
//! Complexity: O(V * (E + V log V)).
//!
//! # Normalization
//!
//! Node scores are divided by `(n-1)(n-2)` and edge scores by `n(n-1)`, the
//! number of ordered pairs in a directed graph. Graphs with fewer than three
//! nodes score zero everywhere.

use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, instrument};

use crate::graph::DecisionGraph;

/// Edge attribute used as path length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EdgeWeight {
    /// Geodesic length in meters; edges without one count as 1.0
    #[default]
    Distance,
    /// Every edge counts as 1.0 (hop count)
    Unit,
}

/// Normalized node and edge betweenness of a graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Centrality {
    pub nodes: HashMap<i64, f64>,
    pub edges: HashMap<(i64, i64), f64>,
}

/// Normalized node betweenness, keyed by node id
pub fn node_betweenness(graph: &DecisionGraph, weight: EdgeWeight) -> HashMap<i64, f64> {
    betweenness(graph, weight).nodes
}

/// Normalized edge betweenness, keyed by (source, target)
pub fn edge_betweenness(graph: &DecisionGraph, weight: EdgeWeight) -> HashMap<(i64, i64), f64> {
    betweenness(graph, weight).edges
}

/// Node and edge betweenness in a single sweep over all sources.
///
/// Every node and every edge of the graph appears in the result. Pairs
/// without a path contribute nothing.
#[must_use]
#[instrument(skip(graph), fields(nodes = graph.node_count(), edges = graph.edge_count()))]
pub fn betweenness(graph: &DecisionGraph, weight: EdgeWeight) -> Centrality {
    let g = graph.inner();
    let n = g.node_count();
    let m = g.edge_count();

    let node_ids: Vec<i64> = g.node_weights().map(|node| node.id).collect();
    let mut edge_keys: Vec<(i64, i64)> = vec![(0, 0); m];
    let mut adjacency: Vec<Vec<OutEdge>> = vec![Vec::new(); n];
    for e in g.edge_references() {
        let (s, t) = (e.source().index(), e.target().index());
        edge_keys[e.id().index()] = (node_ids[s], node_ids[t]);
        let length = match weight {
            EdgeWeight::Distance => e.weight().distance.unwrap_or(1.0),
            EdgeWeight::Unit => 1.0,
        };
        adjacency[s].push(OutEdge {
            head: t,
            edge: e.id().index(),
            length,
        });
    }

    if n < 3 {
        debug!("Fewer than three nodes, all scores are zero");
        return Centrality {
            nodes: node_ids.iter().map(|&id| (id, 0.0)).collect(),
            edges: edge_keys.iter().map(|&key| (key, 0.0)).collect(),
        };
    }

    let (node_scores, edge_scores) = (0..n)
        .into_par_iter()
        .fold(
            || Accumulator::new(n, m),
            |mut acc, s| {
                acc.single_source(&adjacency, s);
                acc
            },
        )
        .map(|acc| (acc.nodes, acc.edges))
        .reduce(
            || (vec![0.0; n], vec![0.0; m]),
            |(mut nodes, mut edges), (other_nodes, other_edges)| {
                add_assign(&mut nodes, &other_nodes);
                add_assign(&mut edges, &other_edges);
                (nodes, edges)
            },
        );

    let n_f = n as f64;
    let node_scale = 1.0 / ((n_f - 1.0) * (n_f - 2.0));
    let edge_scale = 1.0 / (n_f * (n_f - 1.0));

    Centrality {
        nodes: node_ids
            .iter()
            .zip(&node_scores)
            .map(|(&id, &score)| (id, normalize(score, node_scale)))
            .collect(),
        edges: edge_keys
            .iter()
            .zip(&edge_scores)
            .map(|(&key, &score)| (key, normalize(score, edge_scale)))
            .collect(),
    }
}

fn normalize(score: f64, scale: f64) -> f64 {
    (score * scale).clamp(0.0, 1.0)
}

fn add_assign(acc: &mut [f64], other: &[f64]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += b;
    }
}

/// Outgoing edge in the flattened adjacency
#[derive(Debug, Clone, Copy)]
struct OutEdge {
    head: usize,
    edge: usize,
    length: f64,
}

// Min-heap entry; `seq` keeps pops of equal distance in push order
#[derive(Debug, Clone, Copy)]
struct Frontier {
    dist: f64,
    seq: usize,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Per-worker running totals plus scratch buffers reused across sources
struct Accumulator {
    nodes: Vec<f64>,
    edges: Vec<f64>,
    dist: Vec<f64>,
    settled: Vec<bool>,
    sigma: Vec<f64>,
    delta: Vec<f64>,
    /// (predecessor node, edge) pairs on shortest paths
    preds: Vec<Vec<(usize, usize)>>,
    /// Nodes in order of settlement
    order: Vec<usize>,
    heap: BinaryHeap<Frontier>,
}

impl Accumulator {
    fn new(n: usize, m: usize) -> Self {
        Self {
            nodes: vec![0.0; n],
            edges: vec![0.0; m],
            dist: vec![f64::INFINITY; n],
            settled: vec![false; n],
            sigma: vec![0.0; n],
            delta: vec![0.0; n],
            preds: vec![Vec::new(); n],
            order: Vec::with_capacity(n),
            heap: BinaryHeap::new(),
        }
    }

    fn reset(&mut self) {
        self.dist.fill(f64::INFINITY);
        self.settled.fill(false);
        self.sigma.fill(0.0);
        self.delta.fill(0.0);
        for p in &mut self.preds {
            p.clear();
        }
        self.order.clear();
        self.heap.clear();
    }

    fn single_source(&mut self, adjacency: &[Vec<OutEdge>], s: usize) {
        self.reset();
        self.shortest_paths(adjacency, s);
        self.accumulate(s);
    }

    /// Dijkstra from `s`, counting shortest paths and recording predecessors
    fn shortest_paths(&mut self, adjacency: &[Vec<OutEdge>], s: usize) {
        let mut seq = 0;
        self.dist[s] = 0.0;
        self.sigma[s] = 1.0;
        self.heap.push(Frontier {
            dist: 0.0,
            seq,
            node: s,
        });

        while let Some(Frontier { dist, node: v, .. }) = self.heap.pop() {
            if self.settled[v] || dist > self.dist[v] {
                continue;
            }
            self.settled[v] = true;
            self.order.push(v);

            for arc in &adjacency[v] {
                let w = arc.head;
                if self.settled[w] {
                    continue;
                }
                let candidate = dist + arc.length;

                if candidate < self.dist[w] {
                    self.dist[w] = candidate;
                    self.sigma[w] = self.sigma[v];
                    self.preds[w].clear();
                    self.preds[w].push((v, arc.edge));
                    seq += 1;
                    self.heap.push(Frontier {
                        dist: candidate,
                        seq,
                        node: w,
                    });
                } else if candidate == self.dist[w] {
                    self.sigma[w] += self.sigma[v];
                    self.preds[w].push((v, arc.edge));
                }
            }
        }
    }

    /// Back-propagate dependencies, farthest nodes first
    fn accumulate(&mut self, s: usize) {
        while let Some(w) = self.order.pop() {
            let coeff = (1.0 + self.delta[w]) / self.sigma[w];
            for &(v, e) in &self.preds[w] {
                let share = self.sigma[v] * coeff;
                self.edges[e] += share;
                self.delta[v] += share;
            }
            if w != s {
                self.nodes[w] += self.delta[w];
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode};
    use butterfly_common::Error;

    const EPS: f64 = 1e-12;

    fn make_graph(n: i64, edges: &[(i64, i64, f64)]) -> DecisionGraph {
        let nodes = (1..=n).map(|id| GraphNode::new(id, 53.0, 10.0 + id as f64 * 0.001));
        let edges = edges
            .iter()
            .map(|&(s, t, d)| (s, t, GraphEdge::new(1, "residential").with_distance(d)));
        DecisionGraph::from_parts(nodes, edges).unwrap()
    }

    fn bidirectional(pairs: &[(i64, i64)]) -> Vec<(i64, i64, f64)> {
        pairs
            .iter()
            .flat_map(|&(a, b)| [(a, b, 1.0), (b, a, 1.0)])
            .collect()
    }

    #[test]
    fn directed_path_scores() {
        // 1 -> 2 -> 3 -> 4
        let g = make_graph(4, &[(1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0)]);
        let c = betweenness(&g, EdgeWeight::Distance);

        assert!(c.nodes[&1].abs() < EPS);
        assert!(c.nodes[&4].abs() < EPS);
        assert!((c.nodes[&2] - 2.0 / 6.0).abs() < EPS);
        assert!((c.nodes[&3] - 2.0 / 6.0).abs() < EPS);

        assert!((c.edges[&(1, 2)] - 3.0 / 12.0).abs() < EPS);
        assert!((c.edges[&(2, 3)] - 4.0 / 12.0).abs() < EPS);
        assert!((c.edges[&(3, 4)] - 3.0 / 12.0).abs() < EPS);
    }

    #[test]
    fn star_hub_takes_everything() {
        let g = make_graph(5, &bidirectional(&[(1, 2), (1, 3), (1, 4), (1, 5)]));
        let c = node_betweenness(&g, EdgeWeight::Unit);

        assert!((c[&1] - 1.0).abs() < EPS);
        for leaf in 2..=5 {
            assert!(c[&leaf].abs() < EPS);
        }
    }

    #[test]
    fn two_nodes_score_zero() {
        let g = make_graph(2, &[(1, 2, 1.0)]);
        let c = betweenness(&g, EdgeWeight::Distance);

        assert_eq!(c.nodes, HashMap::from([(1, 0.0), (2, 0.0)]));
        assert_eq!(c.edges, HashMap::from([((1, 2), 0.0)]));
    }

    #[test]
    fn empty_graph_gives_empty_scores() {
        let g = DecisionGraph::default();
        let c = betweenness(&g, EdgeWeight::Distance);
        assert!(c.nodes.is_empty());
        assert!(c.edges.is_empty());
    }

    #[test]
    fn equal_length_paths_split_the_credit() {
        // Diamond 1 -> {2, 3} -> 4 with equal lengths
        let g = make_graph(
            4,
            &[(1, 2, 1.0), (1, 3, 1.0), (2, 4, 1.0), (3, 4, 1.0)],
        );
        let c = betweenness(&g, EdgeWeight::Distance);

        // Only pair (1, 4) has interior nodes; each branch gets half of it
        assert!((c.nodes[&2] - 0.5 / 6.0).abs() < EPS);
        assert!((c.nodes[&3] - 0.5 / 6.0).abs() < EPS);
        // (1, 2) carries pair (1, 2) fully and half of (1, 4)
        assert!((c.edges[&(1, 2)] - 1.5 / 12.0).abs() < EPS);
    }

    #[test]
    fn weights_steer_shortest_paths() {
        // Short detour 1 -> 2 -> 3 beats the long direct 1 -> 3
        let edges = [(1, 2, 1.0), (2, 3, 1.0), (1, 3, 5.0)];
        let g = make_graph(3, &edges);

        let by_distance = betweenness(&g, EdgeWeight::Distance);
        assert!((by_distance.nodes[&2] - 1.0 / 2.0).abs() < EPS);
        assert!(by_distance.edges[&(1, 3)].abs() < EPS);

        let by_hops = betweenness(&g, EdgeWeight::Unit);
        assert!(by_hops.nodes[&2].abs() < EPS);
        assert!((by_hops.edges[&(1, 3)] - 1.0 / 6.0).abs() < EPS);
    }

    #[test]
    fn disconnected_components_do_not_fail() {
        let g = make_graph(6, &[(1, 2, 1.0), (2, 3, 1.0), (4, 5, 1.0), (5, 6, 1.0)]);
        let c = betweenness(&g, EdgeWeight::Distance);

        assert!((c.nodes[&2] - 1.0 / 20.0).abs() < EPS);
        assert!((c.nodes[&5] - 1.0 / 20.0).abs() < EPS);
        assert!(c.nodes.values().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn repeated_runs_agree() {
        let g = make_graph(
            6,
            &bidirectional(&[(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 1), (2, 5)]),
        );
        let first = betweenness(&g, EdgeWeight::Unit);
        let second = betweenness(&g, EdgeWeight::Unit);
        for (id, score) in &first.nodes {
            assert!((score - second.nodes[id]).abs() < 1e-12);
        }
        for (key, score) in &first.edges {
            assert!((score - second.edges[key]).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_length_links_never_reach_the_engine() {
        // 1 and 2 coincide: 0 -> 1 -> 2 and 0 -> 2 would tie through a
        // zero-length two-way link
        let nodes = (0..3).map(|id| GraphNode::new(id, 53.0, 10.0 + id as f64 * 0.001));
        let edges = [(0, 1, 1.0), (0, 2, 1.0), (1, 2, 0.0), (2, 1, 0.0)]
            .into_iter()
            .map(|(s, t, d)| (s, t, GraphEdge::new(1, "residential").with_distance(d)));

        let err = DecisionGraph::from_parts(nodes, edges).unwrap_err();
        assert!(matches!(err, Error::NonPositiveLength { from: 1, to: 2, .. }));
    }

    #[test]
    fn short_link_between_neighbours_keeps_direct_paths() {
        let g = make_graph(
            3,
            &[(1, 2, 1.0), (1, 3, 1.0), (2, 3, 1e-9), (3, 2, 1e-9)],
        );
        let c = betweenness(&g, EdgeWeight::Distance);

        // Every pair has a single shortest path without interior nodes
        assert!(c.nodes.values().all(|v| v.abs() < EPS));
        assert!((c.edges[&(1, 2)] - 1.0 / 6.0).abs() < EPS);
        assert!((c.edges[&(2, 3)] - 1.0 / 6.0).abs() < EPS);
    }
}
