//! Application Configuration
//!
//! Loaded from environment variables (with an optional `.env` file),
//! mirroring the teacher's `Config::from_env` in its `main.rs`: one
//! field per spec.md §6 configuration key, `Debug + Clone`, logged once
//! at startup.

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_token: String,
    pub api_base_url: String,

    pub concurrency_sequence: usize,
    pub concurrency_journey: usize,
    pub concurrency_timetable: usize,

    pub proximity_radius_m: f64,
    pub change_penalty_minutes: f64,
    pub ellipse_expansion_factor: f64,
    pub hull_buffer_fraction: f64,
    pub coverage_fraction: f64,
    pub top_k_refined: usize,
    pub alternatives_returned: usize,

    pub timeout_sequence_secs: u64,
    pub timeout_timetable_secs: u64,
    pub timeout_journey_secs: u64,
    pub max_retry_attempts: u32,

    pub cache_dir: std::path::PathBuf,
    pub metrics_port: Option<u16>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Settings {
            api_token: std::env::var("API_TOKEN")
                .map_err(|_| anyhow::anyhow!("API_TOKEN is required"))?,
            api_base_url: env_or("API_BASE_URL", "https://api.tfl.gov.uk"),

            concurrency_sequence: env_parse_or("CONCURRENCY_SEQUENCE", 8)?,
            concurrency_journey: env_parse_or("CONCURRENCY_JOURNEY", 8)?,
            concurrency_timetable: env_parse_or("CONCURRENCY_TIMETABLE", 2)?,

            proximity_radius_m: env_parse_or("PROXIMITY_RADIUS_M", 250.0)?,
            change_penalty_minutes: env_parse_or("CHANGE_PENALTY_MINUTES", 5.0)?,
            ellipse_expansion_factor: env_parse_or("ELLIPSE_EXPANSION_FACTOR", 1.2)?,
            hull_buffer_fraction: env_parse_or("HULL_BUFFER_FRACTION", 0.005)?,
            coverage_fraction: env_parse_or("COVERAGE_FRACTION", 0.70)?,
            top_k_refined: env_parse_or("TOP_K_REFINED", 10)?,
            alternatives_returned: env_parse_or("ALTERNATIVES_RETURNED", 5)?,

            timeout_sequence_secs: env_parse_or("TIMEOUT_SEQUENCE_SECS", 15)?,
            timeout_timetable_secs: env_parse_or("TIMEOUT_TIMETABLE_SECS", 15)?,
            timeout_journey_secs: env_parse_or("TIMEOUT_JOURNEY_SECS", 30)?,
            max_retry_attempts: env_parse_or("MAX_RETRY_ATTEMPTS", 5)?,

            cache_dir: std::path::PathBuf::from(env_or("CACHE_DIR", "./cache")),
            metrics_port: std::env::var("METRICS_PORT").ok().and_then(|v| v.parse().ok()),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}
