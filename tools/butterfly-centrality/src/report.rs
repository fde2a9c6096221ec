//! Summaries and rankings over assigned centrality scores

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::betweenness::EdgeWeight;
use crate::graph::{DecisionGraph, EdgeView, GraphNode};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Summary {
    /// `None` for an empty score set
    pub fn from_scores<I: IntoIterator<Item = f64>>(scores: I) -> Option<Self> {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for score in scores {
            count += 1;
            min = min.min(score);
            max = max.max(score);
            sum += score;
        }
        (count > 0).then(|| Summary {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeScore {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub node_bet_centrality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeScore {
    pub source: i64,
    pub target: i64,
    pub way_id: i64,
    pub way_type: String,
    pub distance: Option<f64>,
    pub bearing: Option<f64>,
    pub edge_bet_centrality: f64,
}

impl From<EdgeView<'_>> for EdgeScore {
    fn from(view: EdgeView<'_>) -> Self {
        Self {
            source: view.source,
            target: view.target,
            way_id: view.attrs.way_id,
            way_type: view.attrs.way_type.clone(),
            distance: view.attrs.distance,
            bearing: view.attrs.bearing,
            edge_bet_centrality: view.attrs.edge_bet_centrality.unwrap_or(0.0),
        }
    }
}

impl From<&GraphNode> for NodeScore {
    fn from(node: &GraphNode) -> Self {
        Self {
            id: node.id,
            lat: node.lat,
            lon: node.lon,
            node_bet_centrality: node.node_bet_centrality.unwrap_or(0.0),
        }
    }
}

/// Cut-off rule selecting the important nodes or edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    /// Score at least the mean score
    Mean,
    /// Score at least `(1 - f) * max`; 0 keeps only the top scorers, 1 keeps all
    Fraction(f64),
}

/// Fractions of the maximum swept by [`importance_levels`]: 0.10, 0.15, ..., 1.00
pub const THRESHOLD_LEVELS: [f64; 19] = [
    0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4, 0.45, 0.5, 0.55, 0.6, 0.65, 0.7, 0.75, 0.8, 0.85,
    0.9, 0.95, 1.0,
];

impl Threshold {
    /// Score a member must reach; `None` for an empty score set
    pub fn cutoff(&self, scores: &[f64]) -> Option<f64> {
        let summary = Summary::from_scores(scores.iter().copied())?;
        let cutoff = match *self {
            Threshold::Mean => summary.mean,
            Threshold::Fraction(f) => (1.0 - f.clamp(0.0, 1.0)) * summary.max,
        };
        // mean can round above max when all scores are equal
        Some(cutoff.min(summary.max))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Mean => write!(f, "mean"),
            Threshold::Fraction(x) => write!(f, "{x}"),
        }
    }
}

impl FromStr for Threshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("mean") {
            return Ok(Threshold::Mean);
        }
        let f: f64 = s
            .parse()
            .map_err(|_| format!("expected `mean` or a fraction in [0, 1], got `{s}`"))?;
        if (0.0..=1.0).contains(&f) {
            Ok(Threshold::Fraction(f))
        } else {
            Err(format!("fraction {f} is outside [0, 1]"))
        }
    }
}

/// Nodes and edges passing one threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Importance {
    pub threshold: Threshold,
    pub node_cutoff: Option<f64>,
    pub edge_cutoff: Option<f64>,
    pub nodes: Vec<i64>,
    pub edges: Vec<(i64, i64)>,
}

impl Importance {
    pub fn new(graph: &DecisionGraph, threshold: Threshold) -> Self {
        let node_scores: Vec<f64> = graph
            .nodes()
            .map(|n| NodeScore::from(n).node_bet_centrality)
            .collect();
        let edge_scores: Vec<f64> = graph
            .edges()
            .map(|e| EdgeScore::from(e).edge_bet_centrality)
            .collect();
        Self {
            threshold,
            node_cutoff: threshold.cutoff(&node_scores),
            edge_cutoff: threshold.cutoff(&edge_scores),
            nodes: important_nodes(graph, threshold).iter().map(|n| n.id).collect(),
            edges: important_edges(graph, threshold)
                .iter()
                .map(|e| (e.source, e.target))
                .collect(),
        }
    }
}

/// Scores of a graph after centrality assignment, ready for serialization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralityReport {
    pub weight: EdgeWeight,
    pub node_summary: Option<Summary>,
    pub edge_summary: Option<Summary>,
    pub nodes: Vec<NodeScore>,
    pub edges: Vec<EdgeScore>,
    pub importance: Vec<Importance>,
}

impl CentralityReport {
    /// Report with one [`Importance`] view per entry of `thresholds`
    pub fn new(graph: &DecisionGraph, weight: EdgeWeight, thresholds: &[Threshold]) -> Self {
        let nodes: Vec<NodeScore> = graph.nodes().map(NodeScore::from).collect();
        let edges: Vec<EdgeScore> = graph.edges().map(EdgeScore::from).collect();
        Self {
            weight,
            node_summary: Summary::from_scores(nodes.iter().map(|n| n.node_bet_centrality)),
            edge_summary: Summary::from_scores(edges.iter().map(|e| e.edge_bet_centrality)),
            nodes,
            edges,
            importance: thresholds
                .iter()
                .map(|&t| Importance::new(graph, t))
                .collect(),
        }
    }
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// The `k` nodes with the highest assigned score, ties broken by id
pub fn top_nodes(graph: &DecisionGraph, k: usize) -> Vec<NodeScore> {
    let mut nodes: Vec<NodeScore> = graph.nodes().map(NodeScore::from).collect();
    nodes.sort_by(|a, b| {
        by_score_desc(a.node_bet_centrality, b.node_bet_centrality).then(a.id.cmp(&b.id))
    });
    nodes.truncate(k);
    nodes
}

/// The `k` edges with the highest assigned score, ties broken by (source, target)
pub fn top_edges(graph: &DecisionGraph, k: usize) -> Vec<EdgeScore> {
    let mut edges: Vec<EdgeScore> = graph.edges().map(EdgeScore::from).collect();
    edges.sort_by(|a, b| {
        by_score_desc(a.edge_bet_centrality, b.edge_bet_centrality)
            .then((a.source, a.target).cmp(&(b.source, b.target)))
    });
    edges.truncate(k);
    edges
}

/// Nodes scoring at least the cut-off of `threshold`, in id order
pub fn important_nodes(graph: &DecisionGraph, threshold: Threshold) -> Vec<NodeScore> {
    let mut nodes: Vec<NodeScore> = graph.nodes().map(NodeScore::from).collect();
    let scores: Vec<f64> = nodes.iter().map(|n| n.node_bet_centrality).collect();
    if let Some(cutoff) = threshold.cutoff(&scores) {
        nodes.retain(|n| n.node_bet_centrality >= cutoff);
    }
    nodes
}

/// Edges scoring at least the cut-off of `threshold`, in construction order
pub fn important_edges(graph: &DecisionGraph, threshold: Threshold) -> Vec<EdgeScore> {
    let mut edges: Vec<EdgeScore> = graph.edges().map(EdgeScore::from).collect();
    let scores: Vec<f64> = edges.iter().map(|e| e.edge_bet_centrality).collect();
    if let Some(cutoff) = threshold.cutoff(&scores) {
        edges.retain(|e| e.edge_bet_centrality >= cutoff);
    }
    edges
}

/// One [`Importance`] view per fraction, in the order given
pub fn importance_levels(graph: &DecisionGraph, fractions: &[f64]) -> Vec<Importance> {
    fractions
        .iter()
        .map(|&f| Importance::new(graph, Threshold::Fraction(f)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betweenness::betweenness;
    use crate::graph::GraphEdge;

    fn scored_path() -> DecisionGraph {
        let nodes = (1..=4).map(|id| GraphNode::new(id, 53.0, 10.0 + id as f64 * 0.001));
        let edges = [(1, 2), (2, 3), (3, 4)]
            .into_iter()
            .map(|(s, t)| (s, t, GraphEdge::new(7, "primary").with_distance(100.0)));
        let mut g = DecisionGraph::from_parts(nodes, edges).unwrap();
        let c = betweenness(&g, EdgeWeight::Distance);
        g.assign_node_centrality(&c.nodes).unwrap();
        g.assign_edge_centrality(&c.edges).unwrap();
        g
    }

    #[test]
    fn summary_of_scores() {
        let s = Summary::from_scores([0.0, 0.5, 1.0]).unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 1.0);
        assert!((s.mean - 0.5).abs() < 1e-12);
        assert!(Summary::from_scores(std::iter::empty()).is_none());
    }

    #[test]
    fn ranking_puts_middle_segment_first() {
        let g = scored_path();
        let edges = top_edges(&g, 1);
        assert_eq!((edges[0].source, edges[0].target), (2, 3));

        let nodes = top_nodes(&g, 2);
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn threshold_selects_top_fraction() {
        let g = scored_path();
        assert_eq!(important_edges(&g, Threshold::Fraction(0.0)).len(), 1);
        // outer segments score 3/4 of the middle one
        assert_eq!(important_edges(&g, Threshold::Fraction(0.3)).len(), 3);
        assert_eq!(important_edges(&g, Threshold::Fraction(1.0)).len(), 3);
    }

    #[test]
    fn mean_threshold_selects_above_average() {
        let g = scored_path();
        // nodes score 0, 1/3, 1/3, 0 with mean 1/6
        let nodes: Vec<i64> = important_nodes(&g, Threshold::Mean)
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(nodes, vec![2, 3]);

        // edges score 1/4, 1/3, 1/4 with mean 5/18
        let edges = important_edges(&g, Threshold::Mean);
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].source, edges[0].target), (2, 3));
    }

    #[test]
    fn mean_of_equal_scores_keeps_everything() {
        let nodes = (1..=3).map(|id| GraphNode::new(id, 53.0, 10.0 + id as f64 * 0.001));
        let edges = [(1, 2), (2, 3), (3, 1)]
            .into_iter()
            .map(|(s, t)| (s, t, GraphEdge::new(7, "primary").with_distance(100.0)));
        let mut g = DecisionGraph::from_parts(nodes, edges).unwrap();
        let c = betweenness(&g, EdgeWeight::Distance);
        g.assign_node_centrality(&c.nodes).unwrap();
        g.assign_edge_centrality(&c.edges).unwrap();

        assert_eq!(important_nodes(&g, Threshold::Mean).len(), 3);
        assert_eq!(important_edges(&g, Threshold::Mean).len(), 3);
    }

    #[test]
    fn levels_grow_with_the_fraction() {
        let g = scored_path();
        let levels = importance_levels(&g, &THRESHOLD_LEVELS);

        assert_eq!(levels.len(), THRESHOLD_LEVELS.len());
        assert!(levels.windows(2).all(|w| w[0].edges.len() <= w[1].edges.len()));
        assert_eq!(levels[0].edges, vec![(2, 3)]);
        assert_eq!(levels.last().unwrap().edges.len(), 3);
        assert_eq!(levels.last().unwrap().edge_cutoff, Some(0.0));
    }

    #[test]
    fn thresholds_parse_from_text() {
        assert_eq!("mean".parse::<Threshold>(), Ok(Threshold::Mean));
        assert_eq!("0.25".parse::<Threshold>(), Ok(Threshold::Fraction(0.25)));
        assert!("1.5".parse::<Threshold>().is_err());
        assert!("median".parse::<Threshold>().is_err());
        assert_eq!(Threshold::Fraction(0.25).to_string(), "0.25");
    }

    #[test]
    fn empty_graph_has_no_cutoff() {
        let g = DecisionGraph::default();
        let view = Importance::new(&g, Threshold::Mean);
        assert_eq!(view.node_cutoff, None);
        assert!(view.nodes.is_empty() && view.edges.is_empty());
    }

    #[test]
    fn report_serializes_all_scores() {
        let g = scored_path();
        let report = CentralityReport::new(
            &g,
            EdgeWeight::Distance,
            &[Threshold::Mean, Threshold::Fraction(0.3)],
        );
        assert_eq!(report.nodes.len(), 4);
        assert_eq!(report.edges.len(), 3);
        assert_eq!(report.importance.len(), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["weight"], "distance");
        assert_eq!(json["edges"].as_array().unwrap().len(), 3);
        assert!(json["node_summary"]["max"].as_f64().unwrap() > 0.0);
        assert_eq!(json["importance"][0]["threshold"], "mean");
        assert_eq!(json["importance"][0]["nodes"], serde_json::json!([2, 3]));
        assert_eq!(json["importance"][1]["threshold"]["fraction"], 0.3);
    }
}
