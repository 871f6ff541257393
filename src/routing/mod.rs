//! Dijkstra with line-change penalty
//!
//! The shortest path in this graph does not have optimal substructure
//! on plain nodes: whether a later edge incurs the 5-minute change
//! penalty depends on which line arrived at the current hub. The
//! search therefore runs over the *line-labelled state space*
//! `(NodeIndex, Option<EdgeKey>)` rather than over bare node indices,
//! using the same reversed-`Ord`-for-min-heap trick the teacher uses
//! for `SearchState` in `optimizer::find_k_shortest_paths`.

use crate::graph::{Edge, Graph, EdgeKey, TRANSFER_KEY};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

pub const CHANGE_PENALTY_MINUTES: f64 = 5.0;

/// A vertex of the line-labelled state space: which hub, and which
/// line (if any) the search arrived on.
type Label = (NodeIndex, Option<EdgeKey>);

#[derive(Debug, Clone, PartialEq)]
struct SearchState {
    cost: f64,
    label: Label,
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// One hop of a reconstructed path: the hub arrived at, and the edge
/// key used to arrive there.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    pub hub: NodeIndex,
    pub via_key: EdgeKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    pub cost: f64,
    pub steps: Vec<PathStep>,
}

fn change_penalty(incoming: Option<&EdgeKey>, key: &EdgeKey, penalty_minutes: f64) -> f64 {
    match incoming {
        Some(prev) if prev != TRANSFER_KEY && key != TRANSFER_KEY && prev != key => penalty_minutes,
        _ => 0.0,
    }
}

/// Shortest cost (and, if `with_path`, reconstructed path) from `source`
/// to `target` over `graph`, including the per-change penalty.
/// `penalty_minutes` is the configurable `change_penalty_minutes`
/// setting (spec.md §6; default `CHANGE_PENALTY_MINUTES`). Returns
/// `None` if `target` is unreachable.
pub fn dijkstra_with_penalty(
    graph: &Graph,
    source: NodeIndex,
    target: NodeIndex,
    penalty_minutes: f64,
    with_path: bool,
) -> Option<ShortestPath> {
    if source == target {
        return Some(ShortestPath {
            cost: 0.0,
            steps: Vec::new(),
        });
    }

    let mut best: HashMap<Label, f64> = HashMap::new();
    let mut prev: HashMap<Label, Label> = HashMap::new();
    let mut heap = BinaryHeap::new();

    let start_label: Label = (source, None);
    best.insert(start_label.clone(), 0.0);
    heap.push(SearchState {
        cost: 0.0,
        label: start_label,
    });

    let mut best_at_target: Option<(f64, Label)> = None;

    while let Some(SearchState { cost, label }) = heap.pop() {
        if let Some(&known) = best.get(&label) {
            if cost > known {
                continue;
            }
        }

        let (node, ref incoming) = label;
        if node == target {
            if best_at_target.as_ref().map(|(c, _)| cost < *c).unwrap_or(true) {
                best_at_target = Some((cost, label.clone()));
            }
            continue;
        }

        for edge_ref in graph.inner().edges(node) {
            let edge: &Edge = edge_ref.weight();
            let Some(weight) = edge.weight else {
                continue;
            };
            let next_node = edge_ref.target();
            let penalty = change_penalty(incoming.as_ref(), &edge.key, penalty_minutes);
            let next_cost = cost + weight + penalty;
            let next_label: Label = (next_node, Some(edge.key.clone()));

            let improves = best
                .get(&next_label)
                .map(|&known| next_cost < known)
                .unwrap_or(true);
            if improves {
                best.insert(next_label.clone(), next_cost);
                if with_path {
                    prev.insert(next_label.clone(), label.clone());
                }
                heap.push(SearchState {
                    cost: next_cost,
                    label: next_label,
                });
            }
        }
    }

    let (cost, mut label) = best_at_target?;
    if !with_path {
        return Some(ShortestPath {
            cost,
            steps: Vec::new(),
        });
    }

    let mut steps = Vec::new();
    while label.0 != source || label.1.is_some() {
        let Some(key) = label.1.clone() else { break };
        steps.push(PathStep {
            hub: label.0,
            via_key: key,
        });
        let Some(p) = prev.get(&label) else { break };
        label = p.clone();
    }
    steps.reverse();

    Some(ShortestPath { cost, steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Direction, Hub, Mode};

    fn hub(id: &str) -> Hub {
        Hub {
            id: id.to_string(),
            name: id.to_string(),
            lat: 51.5,
            lon: -0.1,
            zone: None,
            modes: vec![Mode::Tube],
            lines: vec!["L1".to_string(), "L2".to_string()],
            constituent_stations: vec![],
            primary_naptan_id: id.to_string(),
        }
    }

    fn line_edge(source: &str, target: &str, line: &str, weight: f64) -> Edge {
        Edge {
            source: source.to_string(),
            target: target.to_string(),
            key: line.to_string(),
            line: line.to_string(),
            line_name: line.to_string(),
            mode: Mode::Tube,
            direction: Direction::Unknown,
            branch: None,
            transfer: false,
            weight: Some(weight),
        }
    }

    /// Scenario S2 from the testable-properties section: two routes
    /// compete, and the one with a line change should lose to the
    /// slightly longer but change-free alternative.
    #[test]
    fn penalty_makes_the_direct_route_win() {
        let mut g = Graph::new();
        for id in ["A", "B", "C", "D"] {
            g.add_hub(hub(id));
        }
        g.upsert_edge(line_edge("A", "B", "L1", 3.0));
        g.upsert_edge(line_edge("B", "C", "L2", 4.0));
        g.upsert_edge(line_edge("A", "D", "L1", 10.0));
        g.upsert_edge(line_edge("D", "C", "L1", 1.0));

        let a = g.node_index("A").unwrap();
        let c = g.node_index("C").unwrap();
        let result = dijkstra_with_penalty(&g, a, c, CHANGE_PENALTY_MINUTES, true).unwrap();

        assert_eq!(result.cost, 11.0);
        assert_eq!(result.steps.last().unwrap().via_key, "L1");
    }

    #[test]
    fn cost_to_self_is_zero() {
        let mut g = Graph::new();
        g.add_hub(hub("A"));
        let a = g.node_index("A").unwrap();
        let result = dijkstra_with_penalty(&g, a, a, CHANGE_PENALTY_MINUTES, false).unwrap();
        assert_eq!(result.cost, 0.0);
    }

    #[test]
    fn unreachable_target_returns_none() {
        let mut g = Graph::new();
        g.add_hub(hub("A"));
        g.add_hub(hub("B"));
        let a = g.node_index("A").unwrap();
        let b = g.node_index("B").unwrap();
        assert!(dijkstra_with_penalty(&g, a, b, CHANGE_PENALTY_MINUTES, false).is_none());
    }

    /// Property 12: alternating transfer/line edges incur zero penalty.
    #[test]
    fn alternating_transfer_and_line_edges_have_no_penalty() {
        let mut g = Graph::new();
        for id in ["A", "B", "C"] {
            g.add_hub(hub(id));
        }
        g.upsert_edge(line_edge("A", "B", "L1", 2.0));
        g.upsert_edge(Edge {
            source: "B".to_string(),
            target: "B".to_string(),
            key: TRANSFER_KEY.to_string(),
            line: "walking".to_string(),
            line_name: "walking".to_string(),
            mode: Mode::Tube,
            direction: Direction::Unknown,
            branch: None,
            transfer: true,
            weight: Some(1.0),
        });
        // not a realistic self-loop, but isolates the penalty computation
        g.upsert_edge(line_edge("B", "C", "L2", 2.0));

        let a = g.node_index("A").unwrap();
        let c = g.node_index("C").unwrap();
        let result = dijkstra_with_penalty(&g, a, c, CHANGE_PENALTY_MINUTES, false).unwrap();
        // direct A->B->C costs 2+5(penalty)+2 = 9; via the transfer
        // self-loop costs 2+1+2 = 5 with no penalty since the transfer
        // breaks the line-change adjacency.
        assert_eq!(result.cost, 5.0);
    }
}
