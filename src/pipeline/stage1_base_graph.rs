//! Stage 1 — Base Hub Graph Builder
//!
//! Fetches line/route sequence data for every configured line and
//! direction, groups stations into hubs by their top-most parent
//! identifier, and emits nodes plus null-weighted directed line edges
//! (spec.md §4.2).

use super::worker_pool::WorkerPool;
use super::{corrections, LineSpec, StageReport};
use crate::error::{Error, Result};
use crate::graph::{ConstituentStation, Direction, Edge, Graph, Mode};
use crate::provider::types::{LineRouteSequence, StopPoint};
use crate::pipeline::BuildContext;
use std::collections::HashMap;
use tracing::info;

fn parse_mode(raw: &str) -> Option<Mode> {
    match raw {
        "tube" => Some(Mode::Tube),
        "dlr" | "tram" | "light-rail" => Some(Mode::LightRail),
        "elizabeth-line" => Some(Mode::Elizabeth),
        "overground" => Some(Mode::Overground),
        "national-rail" | "rail" => Some(Mode::Rail),
        _ => None,
    }
}

fn parse_direction(raw: &str) -> Direction {
    match raw {
        "inbound" => Direction::Inbound,
        "outbound" => Direction::Outbound,
        _ => Direction::Unknown,
    }
}

/// Upsert `stop`'s hub, merging its modes/lines/constituents and
/// promoting the representative lat/lon if `stop`'s own mode outranks
/// whatever mode last set it (spec.md §4.2 step 3).
fn ingest_stop(
    graph: &mut Graph,
    representative_mode: &mut HashMap<String, Mode>,
    line_id: &str,
    stop: &StopPoint,
) -> String {
    let hub_id = stop.hub_identity();
    let stop_modes: Vec<Mode> = stop.modes.iter().filter_map(|m| parse_mode(m)).collect();
    let best_incoming_mode = stop_modes.iter().copied().max();

    graph.upsert_hub_index(&hub_id, || crate::graph::Hub {
        id: hub_id.clone(),
        name: stop.name.clone(),
        lat: stop.lat,
        lon: stop.lon,
        zone: stop.zone.clone(),
        modes: Vec::new(),
        lines: Vec::new(),
        constituent_stations: Vec::new(),
        primary_naptan_id: stop.id.clone(),
    });

    if let Some(hub) = graph.get_hub_mut(&hub_id) {
        for m in &stop_modes {
            if !hub.modes.contains(m) {
                hub.modes.push(*m);
            }
        }
        if !hub.has_line(line_id) {
            hub.lines.push(line_id.to_string());
        }
        if !hub
            .constituent_stations
            .iter()
            .any(|c| c.naptan_id == stop.id)
        {
            hub.constituent_stations.push(ConstituentStation {
                name: stop.name.clone(),
                naptan_id: stop.id.clone(),
            });
        }

        let current_best = representative_mode.get(&hub_id).copied();
        let should_promote = match (current_best, best_incoming_mode) {
            (None, Some(_)) => true,
            (Some(existing), Some(incoming)) => incoming.outranks(existing),
            _ => false,
        };
        if should_promote {
            hub.lat = stop.lat;
            hub.lon = stop.lon;
            if let Some(m) = best_incoming_mode {
                representative_mode.insert(hub_id.clone(), m);
            }
        }
    }

    hub_id
}

fn ingest_sequence(
    graph: &mut Graph,
    representative_mode: &mut HashMap<String, Mode>,
    line_id: &str,
    mode: Mode,
    direction: Direction,
    sequence: &LineRouteSequence,
    report: &mut StageReport,
) {
    for branch in &sequence.stop_point_sequences {
        let mut prev_hub: Option<String> = None;
        for stop in &branch.stop_point {
            let hub_id = ingest_stop(graph, representative_mode, line_id, stop);
            if let Some(prev) = prev_hub.as_ref() {
                if prev != &hub_id {
                    graph.upsert_edge(Edge {
                        source: prev.clone(),
                        target: hub_id.clone(),
                        key: line_id.to_string(),
                        line: line_id.to_string(),
                        line_name: line_id.to_string(),
                        mode,
                        direction,
                        branch: branch.branch_id.clone(),
                        transfer: false,
                        weight: None,
                    });
                }
            }
            prev_hub = Some(hub_id);
        }
    }
    let _ = report;
}

pub async fn run(ctx: &BuildContext, lines: &[LineSpec]) -> Result<StageReport> {
    let mut report = StageReport::new("stage1_base_graph");

    let line_mode: HashMap<String, Mode> =
        lines.iter().map(|l| (l.id.clone(), l.mode)).collect();
    let jobs: Vec<(String, String)> = lines
        .iter()
        .flat_map(|l| {
            let id = l.id.clone();
            l.directions.iter().cloned().map(move |d| (id.clone(), d))
        })
        .collect();

    let pool = WorkerPool::new(ctx.settings.concurrency_sequence, ctx.cancelled.clone());
    let provider = ctx.provider.clone();
    let fetched = pool
        .run_all(jobs, move |(line_id, direction)| {
            let provider = provider.clone();
            async move {
                let result = provider.line_route_sequence(&line_id, &direction).await;
                (line_id, direction, result)
            }
        })
        .await;

    let mut representative_mode: HashMap<String, Mode> = HashMap::new();
    let mut graph = ctx.graph.lock().await;

    for outcome in fetched.into_iter().flatten() {
        let (line_id, direction, result) = outcome;
        report.total_records += 1;
        match result {
            Ok(sequence) => {
                let mode = *line_mode.get(&line_id).unwrap_or(&Mode::Tube);
                let direction_tag = parse_direction(&direction);
                ingest_sequence(
                    &mut graph,
                    &mut representative_mode,
                    &line_id,
                    mode,
                    direction_tag,
                    &sequence,
                    &mut report,
                );
            }
            Err(e) => {
                report.malformed_records += 1;
                report.warn(format!("line {line_id}/{direction}: {e}"));
            }
        }
    }

    corrections::apply_corrections(&mut graph);
    report.corrections_applied = corrections::CORRECTIONS.len();

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        malformed = report.malformed_records,
        "stage 1 ingested sequence data"
    );

    drop(graph);

    if report.exceeds_malformed_threshold() {
        return Err(Error::ValidationFailure(format!(
            "stage 1: {:.1}% of sequence fetches malformed, exceeding 1% threshold",
            report.malformed_ratio() * 100.0
        )));
    }

    Ok(report)
}
