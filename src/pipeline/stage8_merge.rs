//! Stage 8 — Graph Weight Merge
//!
//! Splices the consolidated line-weight records into the graph, then
//! prunes any edge that remains unweighted: non-transfer edges as a
//! fail-safe (the gate should have caught these), transfer edges per
//! the default prune policy (spec.md §4.9, §9 open question 2).

use super::StageReport;
use crate::error::Result;
use crate::pipeline::BuildContext;
use tracing::{info, warn};

pub async fn run(ctx: &BuildContext) -> Result<StageReport> {
    let mut report = StageReport::new("stage8_graph_merge");
    let weights = ctx.calculated_weights.lock().await.clone();
    let mut graph = ctx.graph.lock().await;

    for w in &weights {
        report.total_records += 1;
        let applied = graph.set_edge_weight(&w.source, &w.target, &w.line, w.duration_minutes);
        if !applied {
            report.warn(format!(
                "{}->{} on {}: calculated weight has no matching graph edge",
                w.source, w.target, w.line
            ));
        }
    }

    let before_line = graph.edge_count();
    graph.remove_edges_by(|e| !e.is_transfer() && e.weight.is_none());
    let removed_line = before_line - graph.edge_count();
    if removed_line > 0 {
        warn!(removed_line, "fail-safe: removed non-transfer edges that stayed unweighted");
    }

    let before_transfer = graph.edge_count();
    graph.remove_edges_by(|e| e.is_transfer() && e.weight.is_none());
    let removed_transfer = before_transfer - graph.edge_count();

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        removed_line,
        removed_transfer,
        "stage 8 merged weights into final graph"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::graph::{ConstituentStation, Direction, Edge, Hub, Mode, TRANSFER_KEY};
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

    #[tokio::test]
    async fn merges_weight_and_prunes_null_transfer_edges() {
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
            graph.upsert_edge(Edge {
                source: "A".to_string(),
                target: "B".to_string(),
                key: TRANSFER_KEY.to_string(),
                line: "walking".to_string(),
                line_name: "walking".to_string(),
                mode: Mode::Tube,
                direction: Direction::Unknown,
                branch: None,
                transfer: true,
                weight: None,
            });
        }
        ctx.calculated_weights.lock().await.push(CalculatedWeight {
            source: "A".to_string(),
            target: "B".to_string(),
            line: "victoria".to_string(),
            mode: Mode::Tube,
            duration_minutes: 4.0,
            calculated_timestamp: Utc::now(),
        });

        run(&ctx).await.unwrap();

        let graph = ctx.graph.lock().await;
        assert_eq!(graph.get_edge("A", "B", "victoria").unwrap().weight, Some(4.0));
        assert!(graph.get_edge("A", "B", TRANSFER_KEY).is_none());
    }
}
