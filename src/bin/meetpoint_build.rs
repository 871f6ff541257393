//! `meetpoint-build` — runs the eight-stage offline pipeline end to end
//! and writes `final_graph.json`. A thin `tokio::main` wrapper the same
//! shape as the teacher's own `main.rs`: load config, build
//! collaborators, hand off to the library.

use anyhow::{Context, Result};
use clap::Parser;
use meetpoint::config::Settings;
use meetpoint::graph::io;
use meetpoint::pipeline::{self, seed, BuildContext};
use meetpoint::provider::{HttpProviderClient, Timeouts};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "meetpoint-build", about = "Build the hub-level transit graph")]
struct Args {
    /// Where to write the finished graph artifact.
    #[arg(long, default_value = "final_graph.json")]
    out: PathBuf,

    /// Override `API_TOKEN` from the environment.
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
    info!(?settings, "configuration loaded");

    if let Some(port) = settings.metrics_port {
        tokio::spawn(async move {
            let app = axum::Router::new()
                .route("/metrics", axum::routing::get(metrics_handler))
                .route("/health", axum::routing::get(health_handler));
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .expect("bind metrics listener");
            info!(port, "metrics server listening");
            axum::serve(listener, app).await.expect("metrics server");
        });
    }

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

    let ctx = BuildContext::new(provider, settings);
    let outcome = pipeline::run_build(ctx, seed::lines(), seed::terminal_hubs(), seed::fallback_allowlist())
        .await
        .context("build pipeline failed")?;

    for report in &outcome.reports {
        info!(
            stage = report.stage,
            warnings = report.warnings.len(),
            malformed = report.malformed_records,
            total = report.total_records,
            "stage report"
        );
    }

    io::write_atomic(&outcome.graph, &args.out).context("writing graph artifact")?;
    info!(path = %args.out.display(), "graph artifact written");

    Ok(())
}

async fn metrics_handler() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("encode metrics");
    String::from_utf8(buffer).expect("utf8 metrics output")
}

async fn health_handler() -> &'static str {
    "OK"
}
