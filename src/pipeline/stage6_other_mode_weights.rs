//! Stage 6 — Other-Mode Line Weights
//!
//! For every still-unweighted overground/suburban-rail/Elizabeth-line
//! edge, calls the journey endpoint in both directions independently
//! and averages after dropping outliers (spec.md §4.7).

use super::worker_pool::WorkerPool;
use super::{CalculatedWeight, StageReport};
use crate::error::{Error, Result};
use crate::graph::Mode;
use crate::pipeline::BuildContext;
use crate::provider::types::JourneyResult;
use chrono::Utc;
use tracing::info;

const MIN_DURATION_MINUTES: f64 = 1.0;

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Drop samples whose deviation from the median exceeds twice the
/// median absolute deviation, then average and clamp the remainder
/// (spec.md §4.7).
fn reduce_with_mad(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let med = median(&sorted);

    if sorted.len() < 3 {
        // MAD is degenerate for fewer than 3 samples; keep them all.
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        return Some(mean.max(MIN_DURATION_MINUTES));
    }

    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - med).abs()).collect();
    deviations.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mad = median(&deviations);

    let kept: Vec<f64> = if mad == 0.0 {
        sorted
    } else {
        sorted
            .into_iter()
            .filter(|v| (v - med).abs() <= 2.0 * mad)
            .collect()
    };
    if kept.is_empty() {
        return None;
    }
    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    Some(mean.max(MIN_DURATION_MINUTES))
}

pub async fn run(ctx: &BuildContext) -> Result<StageReport> {
    let mut report = StageReport::new("stage6_other_mode_weights");

    let jobs: Vec<(String, String, String, Mode, String, String)> = {
        let graph = ctx.graph.lock().await;
        graph
            .edges()
            .filter(|e| {
                !e.transfer
                    && matches!(e.mode, Mode::Overground | Mode::Rail | Mode::Elizabeth)
                    && e.weight.is_none()
            })
            .filter_map(|e| {
                let from = graph.get_hub(&e.source)?;
                let to = graph.get_hub(&e.target)?;
                Some((
                    e.source.clone(),
                    e.target.clone(),
                    e.line.clone(),
                    e.mode,
                    from.primary_naptan_id.clone(),
                    to.primary_naptan_id.clone(),
                ))
            })
            .collect()
    };

    let pool = WorkerPool::new(ctx.settings.concurrency_journey, ctx.cancelled.clone());
    let provider = ctx.provider.clone();
    let fetched = pool
        .run_all(
            jobs,
            move |(source, target, line, mode, primary_source, primary_target)| {
                let provider = provider.clone();
                async move {
                    let mode_str = mode.to_string();
                    let result = provider.journey(&primary_source, &primary_target, Some(&mode_str)).await;
                    (source, target, line, mode, result)
                }
            },
        )
        .await;

    let mut records = Vec::new();
    for outcome in fetched.into_iter().flatten() {
        let (source, target, line, mode, result) = outcome;
        report.total_records += 1;
        match result {
            Ok(JourneyResult::Duration(minutes)) => {
                if let Some(duration_minutes) = reduce_with_mad(&[minutes as f64]) {
                    records.push(CalculatedWeight {
                        source,
                        target,
                        line,
                        mode,
                        duration_minutes,
                        calculated_timestamp: Utc::now(),
                    });
                }
            }
            Ok(JourneyResult::NoJourney) => {
                report.warn(format!("no {mode} journey found {source}->{target}"));
            }
            Err(e) => {
                report.malformed_records += 1;
                report.warn(format!("{mode} journey {source}->{target}: {e}"));
            }
        }
    }

    info!(records = records.len(), "stage 6 computed other-mode weights");

    ctx.calculated_weights.lock().await.extend(records);

    if report.exceeds_malformed_threshold() {
        return Err(Error::ValidationFailure(format!(
            "stage 6: {:.1}% of journey calls malformed",
            report.malformed_ratio() * 100.0
        )));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mad_drops_a_clear_outlier() {
        let result = reduce_with_mad(&[10.0, 11.0, 9.0, 50.0]).unwrap();
        assert!((8.0..=12.0).contains(&result));
    }

    #[test]
    fn single_sample_is_clamped_to_minimum() {
        let result = reduce_with_mad(&[0.2]).unwrap();
        assert_eq!(result, MIN_DURATION_MINUTES);
    }
}
