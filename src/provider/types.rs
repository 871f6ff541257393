//! Provider DTOs
//!
//! Shapes returned by the third-party transit Provider, matching the
//! HTTP contracts in spec.md §6. These are intentionally permissive
//! (many `Option` fields) since malformed-but-partially-usable payloads
//! are a named failure mode (spec.md §7, `malformed`) rather than an
//! outright parse error.

use serde::{Deserialize, Serialize};

/// A single stop point as returned by the sequence and proximity endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StopPoint {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub parent_id: Option<String>,
    pub top_parent_id: Option<String>,
    pub modes: Vec<String>,
    pub lines: Vec<String>,
    pub zone: Option<String>,
}

impl StopPoint {
    /// spec.md §4.2 step 2: hub identity is `top_parent_id`, falling back
    /// to the stop's own id when absent or empty.
    pub fn hub_identity(&self) -> String {
        match &self.top_parent_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => self.id.clone(),
        }
    }
}

/// One branch's ordered run of stops for a line in a given direction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StopPointSequence {
    pub branch_id: Option<String>,
    pub stop_point: Vec<StopPoint>,
}

/// `GET /line/{id}/route/sequence/{direction}` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineRouteSequence {
    pub line_id: String,
    pub direction: String,
    pub stop_point_sequences: Vec<StopPointSequence>,
}

/// One station's scheduled offset (minutes from the terminal departure)
/// within a timetable branch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimetableStop {
    pub station_id: String,
    pub offset_minutes: f64,
}

/// One branch of a `GET /line/{id}/timetable/{fromStopId}` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimetableBranch {
    pub branch_id: Option<String>,
    pub stops: Vec<TimetableStop>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Timetable {
    pub line_id: String,
    pub from_station_id: String,
    pub branches: Vec<TimetableBranch>,
}

/// Outcome of `GET /journey/journeyresults/{from}/to/{to}`.
#[derive(Debug, Clone, PartialEq)]
pub enum JourneyResult {
    Duration(u32),
    NoJourney,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct RawJourneyResponse {
    pub journeys: Vec<RawJourney>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct RawJourney {
    pub duration: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct RawStopsNearResponse {
    #[serde(default)]
    pub stop_points: Vec<StopPoint>,
}
