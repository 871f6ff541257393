//! Provider Client
//!
//! Wraps the third-party transit HTTP API (spec.md §4.1, §6). The
//! `ProviderClient` trait is the seam the build pipeline and query
//! engine depend on; `HttpProviderClient` is the production
//! `reqwest`-backed implementation, composing a `RateLimiter` per
//! endpoint family and a `RetryPolicy` the same way the teacher
//! separates `OptimizerService` (trait) from `OptimizerServiceImpl`
//! (struct holding its collaborators).

pub mod cache;
pub mod rate_limit;
pub mod retry;
pub mod types;

use crate::error::{Error, Result};
use async_trait::async_trait;
use cache::ProviderCache;
use rate_limit::RateLimiter;
use retry::RetryPolicy;
use std::time::Duration;
use tracing::{debug, warn};
use types::{
    JourneyResult, LineRouteSequence, RawJourneyResponse, RawStopsNearResponse, StopPoint,
    Timetable,
};
use uuid::Uuid;

#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn line_route_sequence(&self, line_id: &str, direction: &str)
        -> Result<LineRouteSequence>;

    async fn stops_near(&self, lat: f64, lon: f64, radius_m: f64) -> Result<Vec<StopPoint>>;

    async fn timetable(&self, line_id: &str, from_station_id: &str) -> Result<Timetable>;

    async fn journey(
        &self,
        from_id: &str,
        to_id: &str,
        mode_hint: Option<&str>,
    ) -> Result<JourneyResult>;
}

/// Deadlines per endpoint family, spec.md §5.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub sequence: Duration,
    pub timetable: Duration,
    pub journey: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            sequence: Duration::from_secs(15),
            timetable: Duration::from_secs(15),
            journey: Duration::from_secs(30),
        }
    }
}

pub struct HttpProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    cache: ProviderCache,
    sequence_limiter: RateLimiter,
    timetable_limiter: RateLimiter,
    journey_limiter: RateLimiter,
    retry: RetryPolicy,
    timeouts: Timeouts,
}

impl HttpProviderClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        cache_dir: impl Into<std::path::PathBuf>,
        max_retry_attempts: u32,
        timeouts: Timeouts,
    ) -> Self {
        HttpProviderClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_token: api_token.into(),
            cache: ProviderCache::new(cache_dir),
            sequence_limiter: RateLimiter::new(8.0, 8.0),
            timetable_limiter: RateLimiter::new(2.0, 2.0),
            journey_limiter: RateLimiter::new(8.0, 8.0),
            retry: RetryPolicy::new(max_retry_attempts),
            timeouts,
        }
    }

    fn request_id() -> String {
        Uuid::new_v4().to_string()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        limiter: &RateLimiter,
        timeout: Duration,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let rid = Self::request_id();
        let url = format!("{}{}", self.base_url, path);
        let query_refs: Vec<(&str, &str)> =
            query.iter().map(|(k, v)| (*k, v.as_str())).collect();

        crate::metrics::provider_calls_total()
            .with_label_values(&[endpoint, "issued"])
            .inc();
        let result = self
            .retry
            .run(|| async {
                limiter.acquire().await;
                debug!(request_id = %rid, %url, "provider GET");

                let resp = self
                    .http
                    .get(&url)
                    .query(&query_refs)
                    .bearer_auth(&self.api_token)
                    .timeout(timeout)
                    .send()
                    .await?;

                if resp.status() == reqwest::StatusCode::UNAUTHORIZED
                    || resp.status() == reqwest::StatusCode::FORBIDDEN
                {
                    return Err(Error::Auth);
                }
                if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(Error::RateLimited(format!("429 from {url}")));
                }
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(Error::NotFound(url.clone()));
                }
                if resp.status().is_server_error() {
                    return Err(Error::Transport(
                        resp.error_for_status().unwrap_err(),
                    ));
                }

                let body = resp.error_for_status()?;
                body.json::<T>()
                    .await
                    .map_err(|e| Error::Malformed(format!("{url}: {e}")))
            })
            .await;

        if result.is_err() {
            crate::metrics::provider_calls_total()
                .with_label_values(&[endpoint, "failed"])
                .inc();
        }
        result
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn line_route_sequence(
        &self,
        line_id: &str,
        direction: &str,
    ) -> Result<LineRouteSequence> {
        let path = format!("/line/{line_id}/route/sequence/{direction}");
        let cache_key = ProviderCache::key_for("GET", &path, &[]);
        if let Some(cached) = self.cache.get::<LineRouteSequence>(&cache_key).await {
            crate::metrics::cache_hits_total()
                .with_label_values(&["line_route_sequence"])
                .inc();
            return Ok(cached);
        }
        crate::metrics::cache_misses_total()
            .with_label_values(&["line_route_sequence"])
            .inc();

        let result: LineRouteSequence = self
            .get_json(
                "line_route_sequence",
                &self.sequence_limiter,
                self.timeouts.sequence,
                &path,
                &[],
            )
            .await?;

        if let Err(e) = self.cache.put(&cache_key, &result).await {
            warn!(error = %e, "failed to write sequence cache entry");
        }
        Ok(result)
    }

    async fn stops_near(&self, lat: f64, lon: f64, radius_m: f64) -> Result<Vec<StopPoint>> {
        let query = vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("radius", radius_m.to_string()),
            (
                "stopTypes",
                "NaptanMetroStation,NaptanRailStation".to_string(),
            ),
        ];
        let resp: RawStopsNearResponse = self
            .get_json(
                "stops_near",
                &self.sequence_limiter,
                self.timeouts.sequence,
                "/stoppoint",
                &query,
            )
            .await?;
        Ok(resp.stop_points)
    }

    async fn timetable(&self, line_id: &str, from_station_id: &str) -> Result<Timetable> {
        let path = format!("/line/{line_id}/timetable/{from_station_id}");
        let cache_key = ProviderCache::key_for("GET", &path, &[]);
        if let Some(cached) = self.cache.get::<Timetable>(&cache_key).await {
            crate::metrics::cache_hits_total()
                .with_label_values(&["timetable"])
                .inc();
            return Ok(cached);
        }
        crate::metrics::cache_misses_total()
            .with_label_values(&["timetable"])
            .inc();

        let result: Timetable = self
            .get_json(
                "timetable",
                &self.timetable_limiter,
                self.timeouts.timetable,
                &path,
                &[],
            )
            .await?;

        if let Err(e) = self.cache.put(&cache_key, &result).await {
            warn!(error = %e, "failed to write timetable cache entry");
        }
        Ok(result)
    }

    async fn journey(
        &self,
        from_id: &str,
        to_id: &str,
        mode_hint: Option<&str>,
    ) -> Result<JourneyResult> {
        let path = format!("/journey/journeyresults/{from_id}/to/{to_id}");
        let mut query = Vec::new();
        if let Some(mode) = mode_hint {
            query.push(("mode", mode.to_string()));
        }

        let resp: std::result::Result<RawJourneyResponse, Error> = self
            .get_json("journey", &self.journey_limiter, self.timeouts.journey, &path, &query)
            .await;

        match resp {
            Ok(r) if r.journeys.is_empty() => Ok(JourneyResult::NoJourney),
            Ok(r) => Ok(JourneyResult::Duration(r.journeys[0].duration)),
            Err(Error::NotFound(_)) => Ok(JourneyResult::NoJourney),
            Err(e) => Err(e),
        }
    }
}

/// A canned-response client for this module's own unit tests, avoiding
/// network I/O — one fixed answer per method. It's `#[cfg(test)]`-gated
/// and so isn't visible to the integration tests under `tests/`; those
/// each define their own local `FixtureProvider` implementing
/// `ProviderClient` directly, keyed by call arguments.
#[cfg(test)]
pub struct MockProviderClient {
    pub sequences: std::collections::HashMap<(String, String), LineRouteSequence>,
    pub stops_near_result: Vec<StopPoint>,
    pub timetables: std::collections::HashMap<(String, String), Timetable>,
    pub journeys: std::collections::HashMap<(String, String), JourneyResult>,
}

#[cfg(test)]
impl Default for MockProviderClient {
    fn default() -> Self {
        MockProviderClient {
            sequences: Default::default(),
            stops_near_result: Vec::new(),
            timetables: Default::default(),
            journeys: Default::default(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ProviderClient for MockProviderClient {
    async fn line_route_sequence(
        &self,
        line_id: &str,
        direction: &str,
    ) -> Result<LineRouteSequence> {
        self.sequences
            .get(&(line_id.to_string(), direction.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{line_id}/{direction}")))
    }

    async fn stops_near(&self, _lat: f64, _lon: f64, _radius_m: f64) -> Result<Vec<StopPoint>> {
        Ok(self.stops_near_result.clone())
    }

    async fn timetable(&self, line_id: &str, from_station_id: &str) -> Result<Timetable> {
        self.timetables
            .get(&(line_id.to_string(), from_station_id.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{line_id}@{from_station_id}")))
    }

    async fn journey(
        &self,
        from_id: &str,
        to_id: &str,
        _mode_hint: Option<&str>,
    ) -> Result<JourneyResult> {
        Ok(self
            .journeys
            .get(&(from_id.to_string(), to_id.to_string()))
            .cloned()
            .unwrap_or(JourneyResult::NoJourney))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_journey_defaults_to_no_journey() {
        let client = MockProviderClient::default();
        let result = client.journey("A", "B", None).await.unwrap();
        assert_eq!(result, JourneyResult::NoJourney);
    }

    #[tokio::test]
    async fn mock_journey_returns_configured_duration() {
        let mut client = MockProviderClient::default();
        client
            .journeys
            .insert(("A".to_string(), "B".to_string()), JourneyResult::Duration(7));
        let result = client.journey("A", "B", Some("walking")).await.unwrap();
        assert_eq!(result, JourneyResult::Duration(7));
    }
}
