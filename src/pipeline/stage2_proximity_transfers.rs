//! Stage 2 — Proximity Transfers
//!
//! For every hub, queries the provider's radius lookup and adds a
//! null-weighted bidirectional transfer edge to each distinct nearby
//! hub that has no existing line edge (spec.md §4.3). `stops_near` may
//! over-return beyond the requested radius (spec.md §4.1), so every
//! candidate is re-checked against `proximity_radius_m` before a
//! transfer edge is recorded.

use super::worker_pool::WorkerPool;
use super::StageReport;
use crate::error::{Error, Result};
use crate::graph::{Direction, Edge, Graph, Mode, TRANSFER_KEY};
use crate::pipeline::BuildContext;
use geo::{prelude::*, Point};
use std::collections::HashSet;
use tracing::info;

/// Great-circle distance between two lat/lon points, in metres.
fn distance_m(a_lat: f64, a_lon: f64, b_lat: f64, b_lon: f64) -> f64 {
    Point::new(a_lon, a_lat).haversine_distance(&Point::new(b_lon, b_lat))
}

fn transfer_edge(source: &str, target: &str) -> Edge {
    Edge {
        source: source.to_string(),
        target: target.to_string(),
        key: TRANSFER_KEY.to_string(),
        line: "walking".to_string(),
        line_name: "walking".to_string(),
        mode: Mode::Rail,
        direction: Direction::Unknown,
        branch: None,
        transfer: true,
        weight: None,
    }
}

fn has_line_edge(graph: &Graph, source: &str, target: &str) -> bool {
    graph
        .edges_from(source)
        .into_iter()
        .any(|(hub, edge)| hub.id == target && !edge.is_transfer())
}

fn unordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

pub async fn run(ctx: &BuildContext) -> Result<StageReport> {
    let mut report = StageReport::new("stage2_proximity_transfers");
    let radius = ctx.settings.proximity_radius_m;

    let hub_locations: Vec<(String, f64, f64)> = {
        let graph = ctx.graph.lock().await;
        graph.hubs().map(|h| (h.id.clone(), h.lat, h.lon)).collect()
    };

    let pool = WorkerPool::new(ctx.settings.concurrency_sequence, ctx.cancelled.clone());
    let provider = ctx.provider.clone();
    let fetched = pool
        .run_all(hub_locations, move |(hub_id, lat, lon)| {
            let provider = provider.clone();
            async move {
                let result = provider.stops_near(lat, lon, radius).await;
                (hub_id, result)
            }
        })
        .await;

    let mut graph = ctx.graph.lock().await;
    let mut pairs_seen: HashSet<(String, String)> = HashSet::new();
    let mut new_pairs = Vec::new();

    for outcome in fetched.into_iter().flatten() {
        let (hub_id, result) = outcome;
        report.total_records += 1;
        match result {
            Ok(stops) => {
                let Some(origin) = graph.get_hub(&hub_id) else {
                    continue;
                };
                let (origin_lat, origin_lon) = (origin.lat, origin.lon);

                for stop in stops {
                    let other_hub = stop.hub_identity();
                    if other_hub == hub_id {
                        continue;
                    }
                    if graph.get_hub(&other_hub).is_none() {
                        continue;
                    }
                    // spec.md §4.1: `stops_near` may over-return beyond
                    // the requested radius; the caller filters.
                    if distance_m(origin_lat, origin_lon, stop.lat, stop.lon) > radius {
                        continue;
                    }
                    if has_line_edge(&graph, &hub_id, &other_hub) {
                        continue;
                    }

                    let created_forward = graph.upsert_edge(transfer_edge(&hub_id, &other_hub));
                    let created_reverse = graph.upsert_edge(transfer_edge(&other_hub, &hub_id));

                    if created_forward || created_reverse {
                        let pair = unordered_pair(&hub_id, &other_hub);
                        if pairs_seen.insert(pair.clone()) {
                            new_pairs.push(pair);
                        }
                    }
                }
            }
            Err(e) => {
                report.malformed_records += 1;
                report.warn(format!("hub {hub_id}: {e}"));
            }
        }
    }

    info!(new_pairs = new_pairs.len(), "stage 2 recorded transfer pairs");
    drop(graph);

    let mut transfer_pairs = ctx.transfer_pairs.lock().await;
    transfer_pairs.extend(new_pairs);
    drop(transfer_pairs);

    if report.exceeds_malformed_threshold() {
        return Err(Error::ValidationFailure(format!(
            "stage 2: {:.1}% of proximity lookups malformed",
            report.malformed_ratio() * 100.0
        )));
    }

    Ok(report)
}
