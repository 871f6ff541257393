//! Transit Hub Multigraph
//!
//! In-memory representation of the hub-level transport multigraph built
//! by the offline pipeline and consumed by the online query engine.
//! Keyed (source, target, key) edges, built on top of `petgraph`'s
//! `DiGraph` the same way the teacher's `TransportGraph` wraps a
//! `DiGraph<TransportNode, TransportEdge>` with a side `HashMap` from a
//! stable string id to `NodeIndex` — except here a second index is also
//! needed, because more than one edge is expected between the same pair
//! of hubs (e.g. the Circle and District lines share segments) and
//! `petgraph` alone has no notion of an edge *key*.

pub mod io;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transport mode, ordered by the mode-rank rule in spec.md §4.2 step 3
/// (tube > light-rail > overground > rail) — used when deciding whose
/// lat/lon wins as a hub's representative location. `Elizabeth` is a
/// fifth mode spec.md §3 lists separately from `Overground`; it isn't
/// named by the rank rule, so it's placed between `LightRail` and
/// `Overground` (higher frequency/capacity than Overground, but not
/// tube-level) — see DESIGN.md's Open Question decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Rail,
    Overground,
    Elizabeth,
    LightRail,
    Tube,
}

impl Mode {
    fn rank(self) -> u8 {
        match self {
            Mode::Tube => 4,
            Mode::LightRail => 3,
            Mode::Elizabeth => 2,
            Mode::Overground => 1,
            Mode::Rail => 0,
        }
    }

    pub fn outranks(self, other: Mode) -> bool {
        self.rank() > other.rank()
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Tube => "tube",
            Mode::LightRail => "light-rail",
            Mode::Elizabeth => "elizabeth",
            Mode::Overground => "overground",
            Mode::Rail => "rail",
        };
        write!(f, "{s}")
    }
}

/// Direction tag carried by line edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
    Unknown,
}

/// A station grouped under a hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentStation {
    pub name: String,
    pub naptan_id: String,
}

/// A graph node: a hub grouping one or more constituent stations that
/// share a top-most parent identifier in the provider's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub zone: Option<String>,
    pub modes: Vec<Mode>,
    pub lines: Vec<String>,
    pub constituent_stations: Vec<ConstituentStation>,
    pub primary_naptan_id: String,
}

impl Hub {
    /// Invariants: id/name non-empty, at least one constituent, valid coordinates.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && !self.name.is_empty()
            && !self.constituent_stations.is_empty()
            && self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn has_line(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }
}

/// The key identifying an edge between a given ordered pair of hubs.
/// `"transfer"` is reserved for walking-transfer edges; anything else is
/// a line id.
pub type EdgeKey = String;

pub const TRANSFER_KEY: &str = "transfer";

/// A directed edge: either a named line edge or a walking transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub key: EdgeKey,
    pub line: String,
    pub line_name: String,
    pub mode: Mode,
    pub direction: Direction,
    pub branch: Option<String>,
    pub transfer: bool,
    pub weight: Option<f64>,
}

impl Edge {
    pub fn is_transfer(&self) -> bool {
        self.transfer
    }
}

/// The hub-level transit multigraph.
///
/// `index` maps a hub id to its `NodeIndex`. `edge_index` maps
/// `(source NodeIndex, target NodeIndex, key)` to the underlying
/// `petgraph` `EdgeIndex`, which is what actually gives this structure
/// its "at most one edge per (source, target, key)" invariant — plain
/// `petgraph::DiGraph` happily stores unkeyed parallel edges and leaves
/// de-duplication to the caller.
pub struct Graph {
    inner: DiGraph<Hub, Edge>,
    index: HashMap<String, NodeIndex>,
    edge_index: HashMap<(NodeIndex, NodeIndex, EdgeKey), EdgeIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: DiGraph::new(),
            index: HashMap::new(),
            edge_index: HashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn get_hub(&self, id: &str) -> Option<&Hub> {
        self.index.get(id).map(|&idx| &self.inner[idx])
    }

    pub fn get_hub_mut(&mut self, id: &str) -> Option<&mut Hub> {
        let idx = *self.index.get(id)?;
        Some(&mut self.inner[idx])
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn hubs(&self) -> impl Iterator<Item = &Hub> {
        self.inner.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner.edge_weights()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.inner.edge_weights_mut()
    }

    /// Insert a new hub. Returns its index. Panics if the id already exists
    /// — callers upsert via `upsert_hub_index` during stage 1, never insert blind.
    pub fn add_hub(&mut self, hub: Hub) -> NodeIndex {
        assert!(
            !self.index.contains_key(&hub.id),
            "hub {} already present",
            hub.id
        );
        let id = hub.id.clone();
        let idx = self.inner.add_node(hub);
        self.index.insert(id, idx);
        idx
    }

    /// Insert the hub if absent; otherwise return the existing index.
    pub fn upsert_hub_index(&mut self, id: &str, make: impl FnOnce() -> Hub) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        self.add_hub(make())
    }

    /// Idempotent edge upsert keyed by (source, target, key). Returns
    /// `true` if a new edge was created, `false` if one already existed
    /// (in which case it is left untouched — callers that need to
    /// overwrite weight use `set_edge_weight`).
    pub fn upsert_edge(&mut self, edge: Edge) -> bool {
        let Some(&src) = self.index.get(&edge.source) else {
            return false;
        };
        let Some(&dst) = self.index.get(&edge.target) else {
            return false;
        };
        let ek = (src, dst, edge.key.clone());
        if self.edge_index.contains_key(&ek) {
            return false;
        }
        let eidx = self.inner.add_edge(src, dst, edge);
        self.edge_index.insert(ek, eidx);
        true
    }

    pub fn has_edge(&self, source: &str, target: &str, key: &str) -> bool {
        let (Some(&src), Some(&dst)) = (self.index.get(source), self.index.get(target)) else {
            return false;
        };
        self.edge_index.contains_key(&(src, dst, key.to_string()))
    }

    pub fn get_edge(&self, source: &str, target: &str, key: &str) -> Option<&Edge> {
        let (&src, &dst) = (self.index.get(source)?, self.index.get(target)?);
        let eidx = self.edge_index.get(&(src, dst, key.to_string()))?;
        Some(&self.inner[*eidx])
    }

    pub fn get_edge_mut(&mut self, source: &str, target: &str, key: &str) -> Option<&mut Edge> {
        let (&src, &dst) = (self.index.get(source)?, self.index.get(target)?);
        let eidx = *self.edge_index.get(&(src, dst, key.to_string()))?;
        Some(&mut self.inner[eidx])
    }

    pub fn set_edge_weight(&mut self, source: &str, target: &str, key: &str, weight: f64) -> bool {
        match self.get_edge_mut(source, target, key) {
            Some(e) => {
                e.weight = Some(weight);
                true
            }
            None => false,
        }
    }

    /// All outgoing edges from a hub, with their target hub.
    pub fn edges_from<'a>(&'a self, id: &str) -> Vec<(&'a Hub, &'a Edge)> {
        let Some(&idx) = self.index.get(id) else {
            return vec![];
        };
        self.inner
            .edges(idx)
            .map(|e| (&self.inner[e.target()], e.weight()))
            .collect()
    }

    /// Remove every edge matching `pred`. `petgraph::Graph::remove_edge`
    /// is a swap-remove: it moves the last edge into the freed slot,
    /// silently invalidating that edge's `EdgeIndex`. Removing in
    /// descending index order and re-pointing `edge_index` at whatever
    /// gets swapped in keeps the side table correct.
    pub fn remove_edges_by<F: Fn(&Edge) -> bool>(&mut self, pred: F) {
        let mut to_remove: Vec<EdgeIndex> = self
            .inner
            .edge_indices()
            .filter(|&eidx| pred(&self.inner[eidx]))
            .collect();
        to_remove.sort_by_key(|e| std::cmp::Reverse(e.index()));

        for eidx in to_remove {
            let removed = &self.inner[eidx];
            let removed_key = (
                self.index[&removed.source],
                self.index[&removed.target],
                removed.key.clone(),
            );
            self.edge_index.remove(&removed_key);

            let last_idx = EdgeIndex::new(self.inner.edge_count() - 1);
            if last_idx != eidx {
                let moved = &self.inner[last_idx];
                let moved_key = (
                    self.index[&moved.source],
                    self.index[&moved.target],
                    moved.key.clone(),
                );
                self.edge_index.insert(moved_key, eidx);
            }

            self.inner.remove_edge(eidx);
        }
    }

    pub fn inner(&self) -> &DiGraph<Hub, Edge> {
        &self.inner
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
