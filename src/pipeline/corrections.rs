//! Data Corrections
//!
//! A small, explicit, hard-coded list of fixes for known provider-data
//! errors, kept in its own module so it can be audited independently
//! of the graph-builder logic that applies it (spec.md §4.2 step 5,
//! §9 "Data corrections"). Used only by stage 1.

use crate::graph::{Direction, Edge, Graph, Mode};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub enum CorrectionOp {
    /// Remove a line from a hub's line-set (e.g. a withdrawn service the
    /// provider still lists).
    RemoveLineMembership { hub: &'static str, line: &'static str },
    /// Insert an edge the sequence data is known to skip in one direction.
    InsertEdge {
        source: &'static str,
        target: &'static str,
        line: &'static str,
        mode: Mode,
        direction: Direction,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct DataCorrection {
    pub op: CorrectionOp,
    pub reason: &'static str,
}

/// This list is intentionally empty in the general-purpose build
/// configuration shipped here; a deployment with concrete provider
/// knowledge populates it with records like:
///
/// ```ignore
/// DataCorrection {
///     op: CorrectionOp::RemoveLineMembership { hub: "940GZZLUWLO", line: "waterloo-city" },
///     reason: "provider lists Waterloo & City at hubs it does not call at",
/// }
/// ```
pub const CORRECTIONS: &[DataCorrection] = &[];

/// Apply every correction in `CORRECTIONS` to `graph`, logging each one.
pub fn apply_corrections(graph: &mut Graph) {
    for correction in CORRECTIONS {
        match correction.op {
            CorrectionOp::RemoveLineMembership { hub, line } => {
                if let Some(h) = graph.get_hub_mut(hub) {
                    h.lines.retain(|l| l != line);
                    info!(hub, line, reason = correction.reason, "applied data correction: removed line membership");
                } else {
                    tracing::warn!(hub, "data correction referenced an unknown hub");
                }
            }
            CorrectionOp::InsertEdge {
                source,
                target,
                line,
                mode,
                direction,
            } => {
                let inserted = graph.upsert_edge(Edge {
                    source: source.to_string(),
                    target: target.to_string(),
                    key: line.to_string(),
                    line: line.to_string(),
                    line_name: line.to_string(),
                    mode,
                    direction,
                    branch: None,
                    transfer: false,
                    weight: None,
                });
                info!(
                    source,
                    target,
                    line,
                    inserted,
                    reason = correction.reason,
                    "applied data correction: inserted edge"
                );
            }
        }
    }
}
