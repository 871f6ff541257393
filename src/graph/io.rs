//! Graph Artifact (De)serialization
//!
//! Maps the in-memory `Graph` to and from the node-link JSON schema
//! given in spec.md §6 (`{"directed": true, "multigraph": true, "graph":
//! {}, "nodes": [...], "links": [...]}`). Kept separate from the graph
//! module itself so the artifact's wire shape can evolve independently
//! of the in-memory representation, the way the teacher separates
//! `db::RawNode`/`RawEdge` (wire shape) from `graph::TransportNode`/
//! `TransportEdge` (in-memory shape).

use super::{ConstituentStation, Direction, Edge, Graph, Hub, Mode};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize)]
struct ArtifactNode {
    id: String,
    name: String,
    lat: f64,
    lon: f64,
    zone: Option<String>,
    modes: Vec<Mode>,
    lines: Vec<String>,
    constituent_stations: Vec<ConstituentStation>,
    primary_naptan_id: String,
}

#[derive(Serialize, Deserialize)]
struct ArtifactLink {
    source: String,
    target: String,
    key: String,
    line: String,
    line_name: String,
    mode: Mode,
    direction: Direction,
    branch: Option<String>,
    transfer: bool,
    weight: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct Artifact {
    directed: bool,
    multigraph: bool,
    graph: serde_json::Value,
    nodes: Vec<ArtifactNode>,
    links: Vec<ArtifactLink>,
}

impl From<&Hub> for ArtifactNode {
    fn from(h: &Hub) -> Self {
        ArtifactNode {
            id: h.id.clone(),
            name: h.name.clone(),
            lat: h.lat,
            lon: h.lon,
            zone: h.zone.clone(),
            modes: h.modes.clone(),
            lines: h.lines.clone(),
            constituent_stations: h.constituent_stations.clone(),
            primary_naptan_id: h.primary_naptan_id.clone(),
        }
    }
}

impl From<&Edge> for ArtifactLink {
    fn from(e: &Edge) -> Self {
        ArtifactLink {
            source: e.source.clone(),
            target: e.target.clone(),
            key: e.key.clone(),
            line: e.line.clone(),
            line_name: e.line_name.clone(),
            mode: e.mode,
            direction: e.direction,
            branch: e.branch.clone(),
            transfer: e.transfer,
            weight: e.weight,
        }
    }
}

/// Serialize the graph to the node-link JSON string described in spec.md §6.
pub fn to_json(graph: &Graph) -> Result<String> {
    let artifact = Artifact {
        directed: true,
        multigraph: true,
        graph: serde_json::json!({}),
        nodes: graph.hubs().map(ArtifactNode::from).collect(),
        links: graph.edges().map(ArtifactLink::from).collect(),
    };
    serde_json::to_string_pretty(&artifact).map_err(Error::from)
}

/// Write the graph artifact atomically: write to a temp file in the same
/// directory, then rename over the destination. This is the same
/// write-to-temp-then-rename discipline spec.md §5 requires of the
/// provider cache, applied to the final artifact as well.
pub fn write_atomic(graph: &Graph, path: &Path) -> Result<()> {
    let json = to_json(graph)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("graph")
    ));
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Parse a graph artifact from a JSON string.
pub fn from_json(s: &str) -> Result<Graph> {
    let artifact: Artifact = serde_json::from_str(s)?;
    let mut graph = Graph::new();

    for n in artifact.nodes {
        graph.add_hub(Hub {
            id: n.id,
            name: n.name,
            lat: n.lat,
            lon: n.lon,
            zone: n.zone,
            modes: n.modes,
            lines: n.lines,
            constituent_stations: n.constituent_stations,
            primary_naptan_id: n.primary_naptan_id,
        });
    }

    for l in artifact.links {
        graph.upsert_edge(Edge {
            source: l.source,
            target: l.target,
            key: l.key,
            line: l.line,
            line_name: l.line_name,
            mode: l.mode,
            direction: l.direction,
            branch: l.branch,
            transfer: l.transfer,
            weight: l.weight,
        });
    }

    Ok(graph)
}

pub fn read(path: &Path) -> Result<Graph> {
    let s = std::fs::read_to_string(path)?;
    from_json(&s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TRANSFER_KEY;

    fn sample_graph() -> Graph {
        let mut g = Graph::new();
        g.add_hub(Hub {
            id: "H1".to_string(),
            name: "Hub One".to_string(),
            lat: 51.5,
            lon: -0.1,
            zone: Some("1".to_string()),
            modes: vec![Mode::Tube],
            lines: vec!["victoria".to_string()],
            constituent_stations: vec![ConstituentStation {
                name: "Station A".to_string(),
                naptan_id: "940GA".to_string(),
            }],
            primary_naptan_id: "940GA".to_string(),
        });
        g.add_hub(Hub {
            id: "H2".to_string(),
            name: "Hub Two".to_string(),
            lat: 51.6,
            lon: -0.2,
            zone: Some("2".to_string()),
            modes: vec![Mode::Tube],
            lines: vec!["victoria".to_string()],
            constituent_stations: vec![ConstituentStation {
                name: "Station B".to_string(),
                naptan_id: "940GB".to_string(),
            }],
            primary_naptan_id: "940GB".to_string(),
        });
        g.upsert_edge(Edge {
            source: "H1".to_string(),
            target: "H2".to_string(),
            key: "victoria".to_string(),
            line: "victoria".to_string(),
            line_name: "Victoria".to_string(),
            mode: Mode::Tube,
            direction: Direction::Outbound,
            branch: None,
            transfer: false,
            weight: Some(3.5),
        });
        g.upsert_edge(Edge {
            source: "H1".to_string(),
            target: "H2".to_string(),
            key: TRANSFER_KEY.to_string(),
            line: "walking".to_string(),
            line_name: "walking".to_string(),
            mode: Mode::Tube,
            direction: Direction::Unknown,
            branch: None,
            transfer: true,
            weight: None,
        });
        g
    }

    #[test]
    fn round_trips_through_json() {
        let g = sample_graph();
        let json = to_json(&g).unwrap();
        let g2 = from_json(&json).unwrap();

        assert_eq!(g.node_count(), g2.node_count());
        assert_eq!(g.edge_count(), g2.edge_count());
        let edge = g2.get_edge("H1", "H2", "victoria").unwrap();
        assert_eq!(edge.weight, Some(3.5));
        let transfer = g2.get_edge("H1", "H2", TRANSFER_KEY).unwrap();
        assert!(transfer.weight.is_none());
    }

    #[test]
    fn artifact_top_level_shape_matches_schema() {
        let g = sample_graph();
        let json = to_json(&g).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["directed"], serde_json::json!(true));
        assert_eq!(v["multigraph"], serde_json::json!(true));
        assert!(v["nodes"].is_array());
        assert!(v["links"].is_array());
    }

    #[test]
    fn write_atomic_round_trips_via_tempdir() {
        let dir = std::env::temp_dir().join(format!("meetpoint-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("final_graph.json");
        let g = sample_graph();
        write_atomic(&g, &path).unwrap();
        let g2 = read(&path).unwrap();
        assert_eq!(g.node_count(), g2.node_count());
        std::fs::remove_dir_all(&dir).ok();
    }
}
