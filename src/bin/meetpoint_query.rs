//! `meetpoint-query` — runs the four query-engine stages against a
//! finished graph artifact and a JSON list of user entries, printing
//! the ranked result as JSON on stdout.
//!
//! CLI surface is intentionally minimal (spec.md §1): the `--users`
//! file already carries resolved `start_hub` ids and
//! `start_station_id`s — fuzzy station-name matching is an external
//! collaborator's job, not this binary's.

use anyhow::{Context, Result};
use clap::Parser;
use meetpoint::config::Settings;
use meetpoint::graph::io;
use meetpoint::provider::{HttpProviderClient, Timeouts};
use meetpoint::query::types::UserEntry;
use meetpoint::query::QueryEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "meetpoint-query", about = "Find the best meeting hub for a group")]
struct Args {
    /// Path to a `final_graph.json` artifact produced by `meetpoint-build`.
    #[arg(long)]
    graph: PathBuf,

    /// Path to a JSON array of user entries: `[{"start_hub": ..., "walk_minutes": ..., "start_station_id": ...}]`.
    #[arg(long)]
    users: PathBuf,

    #[arg(long, env = "API_TOKEN")]
    api_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env().context("loading configuration")?;
    if let Some(token) = args.api_token {
        settings.api_token = token;
    }

    let graph = io::read(&args.graph).context("reading graph artifact")?;
    let users_json = std::fs::read_to_string(&args.users).context("reading users file")?;
    let users: Vec<UserEntry> = serde_json::from_str(&users_json).context("parsing users file")?;

    let provider: Arc<dyn meetpoint::provider::ProviderClient> = Arc::new(HttpProviderClient::new(
        settings.api_base_url.clone(),
        settings.api_token.clone(),
        settings.cache_dir.clone(),
        settings.max_retry_attempts,
        Timeouts {
            sequence: std::time::Duration::from_secs(settings.timeout_sequence_secs),
            timetable: std::time::Duration::from_secs(settings.timeout_timetable_secs),
            journey: std::time::Duration::from_secs(settings.timeout_journey_secs),
        },
    ));

    let engine = QueryEngine::new(provider, graph, settings);
    let result = engine.run(&users).await.context("query failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
