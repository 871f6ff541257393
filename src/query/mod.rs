//! Query Engine Orchestrator
//!
//! `QueryEngine` is structured the same way the teacher structures
//! `Optimizer`: a struct holding its collaborators (a `ProviderClient`
//! and the loaded `Graph`), one public `run` method threading through
//! the stages, and private per-stage helpers mirroring
//! `Optimizer::{optimize, find_k_shortest_paths, path_to_route,
//! calculate_pareto_ranks, calculate_weighted_score}` (spec.md §4.12).

pub mod types;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::pipeline::worker_pool::WorkerPool;
use crate::provider::types::JourneyResult;
use crate::provider::ProviderClient;
use crate::routing::dijkstra_with_penalty;
use crate::spatial::{self, SpatialFilterConfig, Start};
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use types::{EstimatedCandidate, QueryResult, RefinedCandidate, UserEntry};

pub struct QueryEngine {
    provider: Arc<dyn ProviderClient>,
    graph: Graph,
    settings: Settings,
    cancelled: Arc<AtomicBool>,
}

impl QueryEngine {
    pub fn new(provider: Arc<dyn ProviderClient>, graph: Graph, settings: Settings) -> Self {
        QueryEngine {
            provider,
            graph,
            settings,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Find the best meeting hub for `users` (spec.md §4.12).
    pub async fn run(&self, users: &[UserEntry]) -> Result<QueryResult> {
        let starts = self.resolve_starts(users)?;

        let candidates = self.filter_candidates(&starts);
        info!(candidates = candidates.len(), "spatial filter produced candidates");

        let estimated = self.estimate(&candidates, users);
        info!(estimated = estimated.len(), "dijkstra estimate produced finite-cost candidates");

        let top_k = self.rank_estimate(estimated);

        let refined = self.refine(&top_k, users).await?;
        let ranked = self.rank_refined(refined);

        let mut ranked = ranked.into_iter();
        let best = ranked.next().ok_or_else(|| {
            Error::DataGap("no candidate hub survived provider refinement".to_string())
        })?;
        let alternatives = ranked.take(self.settings.alternatives_returned).collect();

        Ok(QueryResult { best, alternatives })
    }

    fn resolve_starts(&self, users: &[UserEntry]) -> Result<Vec<Start>> {
        users
            .iter()
            .map(|u| {
                let hub = self
                    .graph
                    .get_hub(&u.start_hub)
                    .ok_or_else(|| Error::NotFound(format!("start hub {}", u.start_hub)))?;
                Ok(Start { lat: hub.lat, lon: hub.lon })
            })
            .collect()
    }

    fn filter_candidates<'a>(&'a self, starts: &[Start]) -> Vec<&'a crate::graph::Hub> {
        spatial::filter_candidates(
            starts,
            &self.graph,
            SpatialFilterConfig {
                ellipse_expansion_factor: self.settings.ellipse_expansion_factor,
                hull_buffer_fraction: self.settings.hull_buffer_fraction,
                coverage_fraction: self.settings.coverage_fraction,
            },
        )
    }

    /// spec.md §4.12 step 3: for each candidate hub, sum per-user
    /// Dijkstra cost plus walk time; drop candidates unreachable by any
    /// user. Per-candidate Dijkstra runs are CPU-bound and independent,
    /// so this fans out over `rayon` exactly as the teacher's
    /// `path_to_route` conversion fans out over `into_par_iter()`.
    fn estimate(&self, candidates: &[&crate::graph::Hub], users: &[UserEntry]) -> Vec<EstimatedCandidate> {
        let penalty_minutes = self.settings.change_penalty_minutes;
        candidates
            .par_iter()
            .filter_map(|hub| {
                let target = self.graph.node_index(&hub.id)?;
                let mut per_user_minutes = Vec::with_capacity(users.len());
                for user in users {
                    let source = self.graph.node_index(&user.start_hub)?;
                    let path = dijkstra_with_penalty(&self.graph, source, target, penalty_minutes, false)?;
                    per_user_minutes.push(path.cost + user.walk_minutes);
                }
                let total: f64 = per_user_minutes.iter().sum();
                let avg = total / users.len() as f64;
                Some(EstimatedCandidate {
                    hub_id: hub.id.clone(),
                    per_user_minutes,
                    total,
                    avg,
                })
            })
            .collect()
    }

    /// spec.md §4.12 step 4: sort ascending by average, keep the top K.
    fn rank_estimate(&self, mut estimated: Vec<EstimatedCandidate>) -> Vec<EstimatedCandidate> {
        estimated.sort_by(|a, b| a.avg.partial_cmp(&b.avg).unwrap_or(std::cmp::Ordering::Equal));
        estimated.truncate(self.settings.top_k_refined);
        estimated
    }

    /// spec.md §4.12 step 5: re-score the top-K candidates against the
    /// provider's own journey planner. A candidate is dropped if any
    /// user's journey call fails or reports no journey.
    async fn refine(
        &self,
        top_k: &[EstimatedCandidate],
        users: &[UserEntry],
    ) -> Result<Vec<RefinedCandidate>> {
        let jobs: Vec<(String, usize, String, String)> = top_k
            .iter()
            .flat_map(|c| {
                users.iter().enumerate().map(move |(i, u)| {
                    (c.hub_id.clone(), i, u.start_station_id.clone(), c.hub_id.clone())
                })
            })
            .collect();

        let graph = &self.graph;
        let primary_ids: std::collections::HashMap<String, String> = top_k
            .iter()
            .filter_map(|c| Some((c.hub_id.clone(), graph.get_hub(&c.hub_id)?.primary_naptan_id.clone())))
            .collect();

        let pool = WorkerPool::new(self.settings.concurrency_journey, self.cancelled.clone());
        let provider = self.provider.clone();
        let fetched = pool
            .run_all(jobs, move |(hub_id, user_index, from_id, to_hub_id)| {
                let provider = provider.clone();
                let to_id = primary_ids.get(&to_hub_id).cloned().unwrap_or(to_hub_id);
                async move {
                    let result = provider.journey(&from_id, &to_id, None).await;
                    (hub_id, user_index, result)
                }
            })
            .await;

        let mut per_hub: std::collections::HashMap<String, Vec<Option<f64>>> = top_k
            .iter()
            .map(|c| (c.hub_id.clone(), vec![None; users.len()]))
            .collect();

        for outcome in fetched.into_iter().flatten() {
            let (hub_id, user_index, result) = outcome;
            let walk_minutes = users[user_index].walk_minutes;
            if let Ok(JourneyResult::Duration(minutes)) = result {
                if let Some(slots) = per_hub.get_mut(&hub_id) {
                    slots[user_index] = Some(minutes as f64 + walk_minutes);
                }
            }
        }

        let mut refined = Vec::new();
        for c in top_k {
            let Some(slots) = per_hub.remove(&c.hub_id) else { continue };
            let Some(per_user_minutes): Option<Vec<f64>> = slots.into_iter().collect() else {
                continue;
            };
            let total_refined: f64 = per_user_minutes.iter().sum();
            let avg_refined = total_refined / users.len() as f64;
            refined.push(RefinedCandidate {
                hub_id: c.hub_id.clone(),
                per_user_minutes,
                total_refined,
                avg_refined,
            });
        }

        Ok(refined)
    }

    /// spec.md §4.12 step 6: sort refined candidates by `total_refined`
    /// ascending.
    fn rank_refined(&self, mut refined: Vec<RefinedCandidate>) -> Vec<RefinedCandidate> {
        refined.sort_by(|a, b| {
            a.total_refined
                .partial_cmp(&b.total_refined)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        refined
    }
}

/// Convenience entry point for callers that don't need to hold onto a
/// `QueryEngine` across multiple queries (`meetpoint-query`'s `main`).
pub async fn run_query(
    provider: Arc<dyn ProviderClient>,
    graph: Graph,
    settings: Settings,
    users: &[UserEntry],
) -> Result<QueryResult> {
    QueryEngine::new(provider, graph, settings).run(users).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConstituentStation, Direction, Edge, Hub, Mode};
    use crate::provider::MockProviderClient;

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

    fn hub(id: &str, lat: f64, lon: f64) -> Hub {
        Hub {
            id: id.to_string(),
            name: id.to_string(),
            lat,
            lon,
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

    fn line_edge(source: &str, target: &str, weight: f64) -> Edge {
        Edge {
            source: source.to_string(),
            target: target.to_string(),
            key: "victoria".to_string(),
            line: "victoria".to_string(),
            line_name: "victoria".to_string(),
            mode: Mode::Tube,
            direction: Direction::Outbound,
            branch: None,
            transfer: false,
            weight: Some(weight),
        }
    }

    /// Scenario S6: the estimate stage ranks C1 ahead of C2, but
    /// provider refinement reverses the order.
    #[tokio::test]
    async fn s6_refinement_can_reverse_the_estimate_ranking() {
        let mut g = Graph::new();
        for id in ["U1", "U2", "C1", "C2"] {
            g.add_hub(hub(id, 51.5, -0.1));
        }
        // C1 is cheaper by the estimate (shorter graph distance)...
        g.upsert_edge(line_edge("U1", "C1", 5.0));
        g.upsert_edge(line_edge("U2", "C1", 5.0));
        // ...C2 is more expensive by the estimate.
        g.upsert_edge(line_edge("U1", "C2", 8.0));
        g.upsert_edge(line_edge("U2", "C2", 8.0));

        let mut mock = MockProviderClient::default();
        // Estimate favours C1 (total 18) over C2 (total 24); refinement
        // reverses it: C1 total_refined 29, C2 total_refined 24.
        mock.journeys.insert(("U1".to_string(), "C1".to_string()), JourneyResult::Duration(12));
        mock.journeys.insert(("U2".to_string(), "C1".to_string()), JourneyResult::Duration(9));
        mock.journeys.insert(("U1".to_string(), "C2".to_string()), JourneyResult::Duration(8));
        mock.journeys.insert(("U2".to_string(), "C2".to_string()), JourneyResult::Duration(8));

        let engine = QueryEngine::new(Arc::new(mock), g, settings());
        let users = vec![
            UserEntry { start_hub: "U1".to_string(), walk_minutes: 4.0, start_station_id: "U1".to_string() },
            UserEntry { start_hub: "U2".to_string(), walk_minutes: 4.0, start_station_id: "U2".to_string() },
        ];

        let result = engine.run(&users).await.unwrap();
        assert_eq!(result.best.hub_id, "C2");
        assert!(result.alternatives.iter().any(|c| c.hub_id == "C1"));
    }

    /// When no hub is reachable by every user, every candidate is
    /// dropped at the estimate stage and the query as a whole fails —
    /// each user's own hub is trivially reachable from itself but not
    /// from the other user, since no edge connects them.
    #[tokio::test]
    async fn no_shared_reachable_hub_fails_the_query() {
        let mut g = Graph::new();
        g.add_hub(hub("U1", 51.5, -0.10));
        g.add_hub(hub("U2", 51.5, -0.12));

        let engine = QueryEngine::new(Arc::new(MockProviderClient::default()), g, settings());
        let users = vec![
            UserEntry { start_hub: "U1".to_string(), walk_minutes: 2.0, start_station_id: "U1".to_string() },
            UserEntry { start_hub: "U2".to_string(), walk_minutes: 2.0, start_station_id: "U2".to_string() },
        ];

        let result = engine.run(&users).await;
        assert!(result.is_err());
    }
}
