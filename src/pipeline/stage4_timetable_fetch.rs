//! Stage 4 — Timetable Fetch
//!
//! For each line's curated terminal hubs, requests the provider's
//! timetable starting from that terminal and accumulates the
//! per-line union for stage 5 to reduce (spec.md §4.5).

use super::worker_pool::WorkerPool;
use super::{LineSpec, StageReport, TerminalHubs};
use crate::error::{Error, Result};
use crate::pipeline::BuildContext;
use tracing::info;

pub async fn run(
    ctx: &BuildContext,
    lines: &[LineSpec],
    terminal_hubs: &TerminalHubs,
) -> Result<StageReport> {
    let mut report = StageReport::new("stage4_timetable_fetch");

    let jobs: Vec<(String, String)> = lines
        .iter()
        .flat_map(|line| {
            let terminals = terminal_hubs.get(&line.id).cloned().unwrap_or_default();
            terminals
                .into_iter()
                .map(move |terminal| (line.id.clone(), terminal))
        })
        .collect();

    let pool = WorkerPool::new(ctx.settings.concurrency_timetable, ctx.cancelled.clone());
    let provider = ctx.provider.clone();
    let fetched = pool
        .run_all(jobs, move |(line_id, terminal_station_id)| {
            let provider = provider.clone();
            async move {
                let result = provider.timetable(&line_id, &terminal_station_id).await;
                (line_id, result)
            }
        })
        .await;

    let mut timetables = ctx.timetables.lock().await;
    for outcome in fetched.into_iter().flatten() {
        let (line_id, result) = outcome;
        report.total_records += 1;
        match result {
            Ok(timetable) => {
                timetables.entry(line_id).or_default().push(timetable);
            }
            Err(e) => {
                report.malformed_records += 1;
                report.warn(format!("timetable fetch for {line_id}: {e}"));
            }
        }
    }
    let lines_with_data = timetables.len();
    drop(timetables);

    info!(lines_with_data, "stage 4 cached timetable responses");

    if report.exceeds_malformed_threshold() {
        return Err(Error::ValidationFailure(format!(
            "stage 4: {:.1}% of timetable fetches malformed",
            report.malformed_ratio() * 100.0
        )));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::graph::Mode;
    use crate::provider::types::{Timetable, TimetableBranch};
    use crate::provider::MockProviderClient;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn settings() -> Settings {
        Settings {
            api_token: "test".to_string(),
            api_base_url: "http://localhost".to_string(),
            concurrency_sequence: 4,
            concurrency_journey: 4,
            concurrency_timetable: 2,
            proximity_radius_m: 250.0,
            change_penalty_minutes: 5.0,
            ellipse_expansion_factor: 1.2,
            hull_buffer_fraction: 0.005,
            coverage_fraction: 0.70,
            top_k_refined: 10,
            alternatives_returned: 5,
            timeout_sequence_secs: 15,
            timeout_timetable_secs: 15,
            timeout_journey_secs: 30,
            max_retry_attempts: 5,
            cache_dir: std::env::temp_dir(),
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn fetches_timetable_per_terminal_and_unions_by_line() {
        let mut mock = MockProviderClient::default();
        mock.timetables.insert(
            ("victoria".to_string(), "940GBRX".to_string()),
            Timetable {
                line_id: "victoria".to_string(),
                from_station_id: "940GBRX".to_string(),
                branches: vec![TimetableBranch {
                    branch_id: None,
                    stops: vec![],
                }],
            },
        );

        let ctx = BuildContext::new(Arc::new(mock), settings());
        let lines = vec![LineSpec {
            id: "victoria".to_string(),
            mode: Mode::Tube,
            directions: vec!["outbound".to_string()],
        }];
        let mut terminals = HashMap::new();
        terminals.insert("victoria".to_string(), vec!["940GBRX".to_string()]);

        let report = run(&ctx, &lines, &terminals).await.unwrap();
        assert_eq!(report.malformed_records, 0);

        let timetables = ctx.timetables.lock().await;
        assert_eq!(timetables.get("victoria").unwrap().len(), 1);
    }
}
