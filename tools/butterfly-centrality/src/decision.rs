//! Decision-point extraction
//!
//! A decision point is a node referenced more than once across the restricted
//! highway ways: shared by two ways (a junction) or visited twice by the same
//! way (a loop).

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::topology::{GraphConfig, RawNode, RawWay};

/// Count node references across restricted ways.
///
/// Every way folds into a per-worker counter; the counters are merged by
/// summing. A node referenced twice in one way counts twice.
pub fn count_references(ways: &[RawWay], config: &GraphConfig) -> FxHashMap<i64, u32> {
    ways.par_iter()
        .filter(|way| config.is_restricted(way))
        .fold(FxHashMap::default, |mut counter, way| {
            for &node_id in &way.refs {
                *counter.entry(node_id).or_insert(0) += 1;
            }
            counter
        })
        .reduce(FxHashMap::default, merge_counters)
}

fn merge_counters(
    mut left: FxHashMap<i64, u32>,
    right: FxHashMap<i64, u32>,
) -> FxHashMap<i64, u32> {
    if left.len() < right.len() {
        return merge_counters(right, left);
    }
    for (node_id, count) in right {
        *left.entry(node_id).or_insert(0) += count;
    }
    left
}

/// Ids of all decision points in the restricted part of the network
pub fn extract(ways: &[RawWay], config: &GraphConfig) -> HashSet<i64> {
    let decision_points: HashSet<i64> = count_references(ways, config)
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(node_id, _)| node_id)
        .collect();

    info!(
        decision_points = decision_points.len(),
        "Collected decision points"
    );

    decision_points
}

/// Extract decision points and set `is_decision_point` on every node,
/// clearing it on the rest.
pub fn extract_and_flag(
    nodes: &mut [RawNode],
    ways: &[RawWay],
    config: &GraphConfig,
) -> HashSet<i64> {
    let decision_points = extract(ways, config);
    let mut flagged = 0usize;
    for node in nodes.iter_mut() {
        node.is_decision_point = decision_points.contains(&node.id);
        flagged += usize::from(node.is_decision_point);
    }
    debug!(
        flagged,
        unresolved = decision_points.len().saturating_sub(flagged),
        "Flagged decision points"
    );
    decision_points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn road(id: i64, refs: &[i64], highway: &str) -> RawWay {
        RawWay::new(id, refs.to_vec()).with_tag("highway", highway)
    }

    #[test]
    fn shared_nodes_become_decision_points() {
        let ways = vec![
            road(1, &[1, 2, 3], "primary"),
            road(2, &[3, 4, 5], "residential"),
        ];
        let dps = extract(&ways, &GraphConfig::default());
        assert_eq!(dps, HashSet::from([3]));
    }

    #[test]
    fn loop_counts_node_twice() {
        let ways = vec![road(1, &[1, 2, 3, 1], "tertiary")];
        let counts = count_references(&ways, &GraphConfig::default());

        assert_eq!(counts[&1], 2);
        assert_eq!(extract(&ways, &GraphConfig::default()), HashSet::from([1]));
    }

    #[test]
    fn unrestricted_ways_are_ignored() {
        let ways = vec![
            road(1, &[1, 2, 3], "primary"),
            road(2, &[3, 9], "footway"),
            RawWay::new(3, vec![2, 8]),
        ];
        assert!(extract(&ways, &GraphConfig::default()).is_empty());
    }

    #[test]
    fn custom_highway_set_changes_the_network() {
        let ways = vec![road(1, &[1, 2], "service"), road(2, &[2, 3], "service")];
        let config = GraphConfig::with_highway_types(["service"]);

        assert!(extract(&ways, &GraphConfig::default()).is_empty());
        assert_eq!(extract(&ways, &config), HashSet::from([2]));
    }

    #[test]
    fn extraction_ignores_way_order() {
        let mut ways = vec![
            road(1, &[1, 2, 3], "primary"),
            road(2, &[3, 4, 1], "secondary"),
            road(3, &[4, 5], "trunk"),
        ];
        let forward = extract(&ways, &GraphConfig::default());
        ways.reverse();
        assert_eq!(forward, extract(&ways, &GraphConfig::default()));
        assert_eq!(forward, HashSet::from([1, 3, 4]));
    }

    #[test]
    fn flags_only_decision_points() {
        let ways = vec![
            road(1, &[1, 2, 3], "primary"),
            road(2, &[3, 4], "residential"),
        ];
        let mut nodes: Vec<RawNode> = (1..=4).map(|id| RawNode::new(id, 10.0, 53.0)).collect();
        nodes[0].is_decision_point = true;

        let dps = extract_and_flag(&mut nodes, &ways, &GraphConfig::default());

        assert_eq!(dps, HashSet::from([3]));
        let flagged: Vec<i64> = nodes
            .iter()
            .filter(|n| n.is_decision_point)
            .map(|n| n.id)
            .collect();
        assert_eq!(flagged, vec![3]);
    }
}
