//! Stage 5 — Tube/Light-Rail Line Weights
//!
//! Reduces the timetable union cached by stage 4 into per-edge averaged
//! durations, falling back to the journey endpoint for a curated
//! allow-list of edges timetables structurally omit (spec.md §4.6).

use super::worker_pool::WorkerPool;
use super::{CalculatedWeight, FallbackEdge, LineSpec, StageReport};
use crate::error::{Error, Result};
use crate::graph::{Graph, Mode};
use crate::pipeline::BuildContext;
use crate::provider::types::JourneyResult;
use chrono::Utc;
use std::collections::HashMap;
use tracing::info;

/// spec.md §4.6: disagreement between the cheapest and the costliest
/// observed duration for the same edge beyond this is logged, not fatal.
const SPREAD_WARNING_THRESHOLD_MINUTES: f64 = 2.0;
const MIN_DURATION_MINUTES: f64 = 0.1;

fn station_to_hub_index(graph: &Graph) -> HashMap<String, String> {
    graph
        .hubs()
        .flat_map(|h| {
            h.constituent_stations
                .iter()
                .map(move |c| (c.naptan_id.clone(), h.id.clone()))
        })
        .collect()
}

/// Reduce a set of observed durations for one edge into a single
/// `(mean, spread_warning)` pair, clamping and dropping bad samples per
/// spec.md §4.6.
fn reduce_durations(samples: &[f64]) -> Option<(f64, bool)> {
    let clamped: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|d| *d > 0.0)
        .map(|d| d.max(MIN_DURATION_MINUTES))
        .collect();
    if clamped.is_empty() {
        return None;
    }
    let mean = clamped.iter().sum::<f64>() / clamped.len() as f64;
    let rounded = (mean * 10.0).round() / 10.0;
    let spread = clamped.iter().cloned().fold(f64::MIN, f64::max)
        - clamped.iter().cloned().fold(f64::MAX, f64::min);
    Some((rounded, spread > SPREAD_WARNING_THRESHOLD_MINUTES))
}

pub async fn run(
    ctx: &BuildContext,
    lines: &[LineSpec],
    fallback_allowlist: &[FallbackEdge],
) -> Result<StageReport> {
    let mut report = StageReport::new("stage5_tube_line_weights");
    let line_mode: HashMap<String, Mode> = lines.iter().map(|l| (l.id.clone(), l.mode)).collect();

    let mut durations: HashMap<(String, String, String), Vec<f64>> = HashMap::new();

    {
        let graph = ctx.graph.lock().await;
        let station_to_hub = station_to_hub_index(&graph);
        let timetables = ctx.timetables.lock().await;

        for line in lines {
            let Some(responses) = timetables.get(&line.id) else {
                continue;
            };
            for response in responses {
                for branch in &response.branches {
                    for window in branch.stops.windows(2) {
                        let (from, to) = (&window[0], &window[1]);
                        report.total_records += 1;
                        let (Some(from_hub), Some(to_hub)) = (
                            station_to_hub.get(&from.station_id),
                            station_to_hub.get(&to.station_id),
                        ) else {
                            report.malformed_records += 1;
                            continue;
                        };
                        if from_hub == to_hub {
                            continue;
                        }
                        if !graph.has_edge(from_hub, to_hub, &line.id) {
                            continue;
                        }
                        let d = to.offset_minutes - from.offset_minutes;
                        durations
                            .entry((line.id.clone(), from_hub.clone(), to_hub.clone()))
                            .or_default()
                            .push(d);
                    }
                }
            }
        }
    }

    let mut records = Vec::new();
    for ((line, from, to), samples) in &durations {
        match reduce_durations(samples) {
            Some((mean, spread_warning)) => {
                if spread_warning {
                    report.warn(format!(
                        "{line} {from}->{to}: timetable durations spread > {SPREAD_WARNING_THRESHOLD_MINUTES} min"
                    ));
                }
                let mode = *line_mode.get(line).unwrap_or(&Mode::Tube);
                records.push(CalculatedWeight {
                    source: from.clone(),
                    target: to.clone(),
                    line: line.clone(),
                    mode,
                    duration_minutes: mean,
                    calculated_timestamp: Utc::now(),
                });
            }
            None => {
                report.warn(format!("{line} {from}->{to}: no usable timetable samples"));
            }
        }
    }

    let covered: std::collections::HashSet<(String, String, String)> = records
        .iter()
        .map(|r| (r.line.clone(), r.source.clone(), r.target.clone()))
        .collect();

    let fallback_jobs: Vec<(String, String, String, String)> = {
        let graph = ctx.graph.lock().await;
        fallback_allowlist
            .iter()
            .filter(|f| !covered.contains(&(f.line.clone(), f.from_hub.clone(), f.to_hub.clone())))
            .filter_map(|f| {
                let from = graph.get_hub(&f.from_hub)?;
                let to = graph.get_hub(&f.to_hub)?;
                Some((
                    f.line.clone(),
                    f.from_hub.clone(),
                    f.to_hub.clone(),
                    format!("{}|{}", from.primary_naptan_id, to.primary_naptan_id),
                ))
            })
            .collect()
    };

    let pool = WorkerPool::new(ctx.settings.concurrency_journey, ctx.cancelled.clone());
    let provider = ctx.provider.clone();
    let fetched = pool
        .run_all(fallback_jobs, move |(line, from_hub, to_hub, ids)| {
            let provider = provider.clone();
            async move {
                let mut parts = ids.split('|');
                let from_id = parts.next().unwrap_or_default().to_string();
                let to_id = parts.next().unwrap_or_default().to_string();
                let result = provider.journey(&from_id, &to_id, None).await;
                (line, from_hub, to_hub, result)
            }
        })
        .await;

    for outcome in fetched.into_iter().flatten() {
        let (line, from_hub, to_hub, result) = outcome;
        report.total_records += 1;
        match result {
            Ok(JourneyResult::Duration(minutes)) => {
                if let Some((mean, _)) = reduce_durations(&[minutes as f64]) {
                    let mode = *line_mode.get(&line).unwrap_or(&Mode::Tube);
                    records.push(CalculatedWeight {
                        source: from_hub,
                        target: to_hub,
                        line,
                        mode,
                        duration_minutes: mean,
                        calculated_timestamp: Utc::now(),
                    });
                }
            }
            Ok(JourneyResult::NoJourney) => {
                report.warn(format!("fallback journey {line} {from_hub}->{to_hub}: no journey"));
            }
            Err(e) => {
                report.malformed_records += 1;
                report.warn(format!("fallback journey {line} {from_hub}->{to_hub}: {e}"));
            }
        }
    }

    info!(records = records.len(), "stage 5 computed line weights");

    let mut weights = ctx.calculated_weights.lock().await;
    weights.extend(records);
    drop(weights);

    if report.exceeds_malformed_threshold() {
        return Err(Error::ValidationFailure(format!(
            "stage 5: {:.1}% of records malformed",
            report.malformed_ratio() * 100.0
        )));
    }

    Ok(report)
}
