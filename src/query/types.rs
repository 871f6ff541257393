//! Query Engine Types
//!
//! Request and result shapes for `QueryEngine::run` (spec.md §4.12).

use serde::{Deserialize, Serialize};

/// One traveller's starting point, parsed from the CLI/API input.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserEntry {
    /// Id of the hub the user's nearest station resolved to.
    pub start_hub: String,
    pub walk_minutes: f64,
    /// The constituent station id used for provider `journey` calls.
    /// May differ from the hub's `primary_naptan_id` when the user's
    /// matched hub groups more than one station (spec.md §4.12 step 1).
    pub start_station_id: String,
}

/// A candidate hub after the cheap Dijkstra-based estimate (spec.md
/// §4.12 step 3).
#[derive(Debug, Clone, Serialize)]
pub struct EstimatedCandidate {
    pub hub_id: String,
    pub per_user_minutes: Vec<f64>,
    pub total: f64,
    pub avg: f64,
}

/// A candidate hub after provider-refinement (spec.md §4.12 step 5).
#[derive(Debug, Clone, Serialize)]
pub struct RefinedCandidate {
    pub hub_id: String,
    pub per_user_minutes: Vec<f64>,
    pub total_refined: f64,
    pub avg_refined: f64,
}

/// The final ranked result: the winner plus up to
/// `Settings::alternatives_returned` runners-up, in ascending order of
/// `total_refined`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub best: RefinedCandidate,
    pub alternatives: Vec<RefinedCandidate>,
}
