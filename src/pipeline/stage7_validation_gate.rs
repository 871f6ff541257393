//! Stage 7 — Validation Gate
//!
//! Cross-checks the collected line-edge weights against graph
//! structure before stage 8 is allowed to run. Any mismatch halts the
//! pipeline with a diagnostic report (spec.md §4.8).

use super::StageReport;
use crate::error::{Error, Result};
use crate::graph::TRANSFER_KEY;
use crate::pipeline::BuildContext;
use std::collections::HashMap;
use tracing::error;

pub async fn run(ctx: &BuildContext) -> Result<StageReport> {
    let mut report = StageReport::new("stage7_validation_gate");
    let graph = ctx.graph.lock().await;
    let weights = ctx.calculated_weights.lock().await;

    let mut seen: HashMap<(String, String, String), ()> = HashMap::new();
    let mut diagnostics = Vec::new();

    for w in weights.iter() {
        report.total_records += 1;
        let key = (w.source.clone(), w.target.clone(), w.line.clone());

        if seen.insert(key.clone(), ()).is_some() {
            diagnostics.push(format!(
                "duplicate calculated-weight record for {}->{} on {}",
                key.0, key.1, key.2
            ));
        }
        if !w.duration_minutes.is_finite() || w.duration_minutes <= 0.0 || w.duration_minutes > 180.0 {
            diagnostics.push(format!(
                "{}->{} on {}: duration_minutes {} out of range (0, 180]",
                key.0, key.1, key.2, w.duration_minutes
            ));
        }
        if !graph.has_edge(&w.source, &w.target, &w.line) {
            diagnostics.push(format!(
                "{}->{} on {}: calculated-weight record has no corresponding graph edge",
                key.0, key.1, key.2
            ));
        }
    }

    for edge in graph.edges().filter(|e| !e.is_transfer()) {
        let key = (edge.source.clone(), edge.target.clone(), edge.line.clone());
        if !seen.contains_key(&key) {
            diagnostics.push(format!(
                "{}->{} on {}: non-transfer edge has no calculated-weight record",
                key.0, key.1, key.2
            ));
        }
    }

    for edge in graph.edges().filter(|e| e.is_transfer()) {
        match graph.get_edge(&edge.target, &edge.source, TRANSFER_KEY) {
            None => diagnostics.push(format!(
                "{}->{}: transfer edge missing its reverse twin",
                edge.source, edge.target
            )),
            Some(reverse) => match (edge.weight, reverse.weight) {
                (Some(a), Some(b)) if (a - b).abs() > 0.01 => diagnostics.push(format!(
                    "{}->{}: transfer weight {a} disagrees with reverse {b}",
                    edge.source, edge.target
                )),
                (Some(_), None) | (None, Some(_)) => diagnostics.push(format!(
                    "{}->{}: transfer weight is asymmetrically null",
                    edge.source, edge.target
                )),
                _ => {}
            },
        }
    }

    if diagnostics.is_empty() {
        Ok(report)
    } else {
        for d in &diagnostics {
            report.warn(d.clone());
        }
        error!(count = diagnostics.len(), "validation gate failed");
        Err(Error::ValidationFailure(diagnostics.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::graph::{ConstituentStation, Direction, Edge, Hub, Mode};
    use crate::pipeline::CalculatedWeight;
    use crate::provider::MockProviderClient;
    use chrono::Utc;
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

    fn hub(id: &str) -> Hub {
        Hub {
            id: id.to_string(),
            name: id.to_string(),
            lat: 51.5,
            lon: -0.1,
            zone: None,
            modes: vec![Mode::Tube],
            lines: vec!["victoria".to_string()],
            constituent_stations: vec![ConstituentStation {
                name: id.to_string(),
                naptan_id: id.to_string(),
            }],
            primary_naptan_id: id.to_string(),
        }
    }

    /// Scenario S5: an out-of-range duration halts the gate.
    #[tokio::test]
    async fn s5_out_of_range_duration_halts_the_gate() {
        let ctx = BuildContext::new(Arc::new(MockProviderClient::default()), settings());
        {
            let mut graph = ctx.graph.lock().await;
            graph.add_hub(hub("A"));
            graph.add_hub(hub("B"));
            graph.upsert_edge(Edge {
                source: "A".to_string(),
                target: "B".to_string(),
                key: "victoria".to_string(),
                line: "victoria".to_string(),
                line_name: "victoria".to_string(),
                mode: Mode::Tube,
                direction: Direction::Outbound,
                branch: None,
                transfer: false,
                weight: None,
            });
        }
        ctx.calculated_weights.lock().await.push(CalculatedWeight {
            source: "A".to_string(),
            target: "B".to_string(),
            line: "victoria".to_string(),
            mode: Mode::Tube,
            duration_minutes: 250.0,
            calculated_timestamp: Utc::now(),
        });

        let result = run(&ctx).await;
        assert!(matches!(result, Err(Error::ValidationFailure(_))));
    }

    #[tokio::test]
    async fn a_fully_consistent_graph_passes() {
        let ctx = BuildContext::new(Arc::new(MockProviderClient::default()), settings());
        {
            let mut graph = ctx.graph.lock().await;
            graph.add_hub(hub("A"));
            graph.add_hub(hub("B"));
            graph.upsert_edge(Edge {
                source: "A".to_string(),
                target: "B".to_string(),
                key: "victoria".to_string(),
                line: "victoria".to_string(),
                line_name: "victoria".to_string(),
                mode: Mode::Tube,
                direction: Direction::Outbound,
                branch: None,
                transfer: false,
                weight: Some(3.0),
            });
        }
        ctx.calculated_weights.lock().await.push(CalculatedWeight {
            source: "A".to_string(),
            target: "B".to_string(),
            line: "victoria".to_string(),
            mode: Mode::Tube,
            duration_minutes: 3.0,
            calculated_timestamp: Utc::now(),
        });

        assert!(run(&ctx).await.is_ok());
    }
}
