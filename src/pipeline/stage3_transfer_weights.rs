//! Stage 3 — Transfer Weight Calculation
//!
//! For every pair recorded by stage 2, calls the provider's
//! walking-journey endpoint and writes the resulting duration to both
//! directed transfer edges (spec.md §4.4).

use super::worker_pool::WorkerPool;
use super::StageReport;
use crate::error::{Error, Result};
use crate::graph::TRANSFER_KEY;
use crate::pipeline::BuildContext;
use crate::provider::types::JourneyResult;
use std::collections::HashMap;
use tracing::info;

pub async fn run(ctx: &BuildContext) -> Result<StageReport> {
    let mut report = StageReport::new("stage3_transfer_weights");
    let pairs: Vec<(String, String)> = ctx.transfer_pairs.lock().await.clone();

    let primary_ids: HashMap<String, String> = {
        let graph = ctx.graph.lock().await;
        pairs
            .iter()
            .flat_map(|(a, b)| [a.clone(), b.clone()])
            .filter_map(|id| {
                graph
                    .get_hub(&id)
                    .map(|h| (id.clone(), h.primary_naptan_id.clone()))
            })
            .collect()
    };

    let jobs: Vec<(String, String, String, String)> = pairs
        .iter()
        .filter_map(|(a, b)| {
            let pa = primary_ids.get(a)?.clone();
            let pb = primary_ids.get(b)?.clone();
            Some((a.clone(), b.clone(), pa, pb))
        })
        .collect();

    let pool = WorkerPool::new(ctx.settings.concurrency_journey, ctx.cancelled.clone());
    let provider = ctx.provider.clone();
    let fetched = pool
        .run_all(jobs, move |(a, b, primary_a, primary_b)| {
            let provider = provider.clone();
            async move {
                let result = provider.journey(&primary_a, &primary_b, Some("walking")).await;
                (a, b, result)
            }
        })
        .await;

    let mut graph = ctx.graph.lock().await;
    let mut weighted = 0usize;
    for outcome in fetched.into_iter().flatten() {
        let (a, b, result) = outcome;
        report.total_records += 1;
        match result {
            Ok(JourneyResult::Duration(minutes)) => {
                let weight = minutes as f64;
                graph.set_edge_weight(&a, &b, TRANSFER_KEY, weight);
                graph.set_edge_weight(&b, &a, TRANSFER_KEY, weight);
                weighted += 1;
            }
            Ok(JourneyResult::NoJourney) => {
                report.warn(format!("no walking journey found between {a} and {b}"));
            }
            Err(e) => {
                report.malformed_records += 1;
                report.warn(format!("transfer weight {a}<->{b}: {e}"));
            }
        }
    }
    drop(graph);

    info!(weighted, total = report.total_records, "stage 3 wrote transfer weights");

    if report.exceeds_malformed_threshold() {
        return Err(Error::ValidationFailure(format!(
            "stage 3: {:.1}% of transfer-weight lookups malformed",
            report.malformed_ratio() * 100.0
        )));
    }

    Ok(report)
}
