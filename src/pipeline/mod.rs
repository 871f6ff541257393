//! Offline Build Pipeline
//!
//! Eight sequential, validation-gated stages that turn raw Provider
//! data into `final_graph.json` (spec.md §2A, §4.2-§4.9). Each stage is
//! its own module exposing a single async `run` function taking a
//! shared `BuildContext`, mirroring the one-module-per-concern split
//! the teacher uses for `graph`, `optimizer`, and `constraints`.

pub mod corrections;
pub mod seed;
pub mod stage1_base_graph;
pub mod stage2_proximity_transfers;
pub mod stage3_transfer_weights;
pub mod stage4_timetable_fetch;
pub mod stage5_tube_line_weights;
pub mod stage6_other_mode_weights;
pub mod stage7_validation_gate;
pub mod stage8_merge;
pub mod worker_pool;

use crate::config::Settings;
use crate::error::Error;
use crate::graph::{Graph, Mode};
use crate::provider::ProviderClient;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// One line the build pipeline processes: its provider id, transport
/// mode, and the direction tags to request sequence data for.
#[derive(Debug, Clone)]
pub struct LineSpec {
    pub id: String,
    pub mode: Mode,
    pub directions: Vec<String>,
}

/// Line id -> terminal station ids, a curated constant per spec.md §4.5.
pub type TerminalHubs = HashMap<String, Vec<String>>;

/// An edge known to be unrepresented in timetable data, resolved via
/// the journey endpoint instead (spec.md §4.6's fallback allow-list).
#[derive(Debug, Clone)]
pub struct FallbackEdge {
    pub line: String,
    pub from_hub: String,
    pub to_hub: String,
}

/// One record of the calculated-weights artifact (spec.md §6), produced
/// by stages 5 and 6 and consumed by stages 7 and 8.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CalculatedWeight {
    pub source: String,
    pub target: String,
    pub line: String,
    pub mode: Mode,
    pub duration_minutes: f64,
    pub calculated_timestamp: DateTime<Utc>,
}

/// Per-stage accumulator of warnings and malformed-record counts,
/// attached to the build outcome for diagnostics.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: &'static str,
    pub warnings: Vec<String>,
    pub malformed_records: usize,
    pub total_records: usize,
    pub corrections_applied: usize,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        StageReport {
            stage,
            warnings: Vec::new(),
            malformed_records: 0,
            total_records: 0,
            corrections_applied: 0,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage = self.stage, "{message}");
        self.warnings.push(message);
    }

    pub fn malformed_ratio(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            self.malformed_records as f64 / self.total_records as f64
        }
    }

    /// spec.md §7: a stage halts once malformed records exceed 1% of
    /// everything it processed.
    pub fn exceeds_malformed_threshold(&self) -> bool {
        self.total_records > 0 && self.malformed_ratio() > 0.01
    }
}

/// Shared state threaded through every build stage: the provider
/// client, the graph under construction behind a single-writer lock
/// (spec.md §5), and the side artifacts later stages depend on.
pub struct BuildContext {
    pub provider: Arc<dyn ProviderClient>,
    pub graph: Mutex<Graph>,
    pub settings: Settings,
    pub cancelled: Arc<AtomicBool>,
    pub transfer_pairs: Mutex<Vec<(String, String)>>,
    pub calculated_weights: Mutex<Vec<CalculatedWeight>>,
    /// Per-line timetables fetched from every configured terminal in
    /// stage 4; stage 5 reduces this union into directional weights.
    pub timetables: Mutex<HashMap<String, Vec<crate::provider::types::Timetable>>>,
}

impl BuildContext {
    pub fn new(provider: Arc<dyn ProviderClient>, settings: Settings) -> Self {
        BuildContext {
            provider,
            graph: Mutex::new(Graph::new()),
            settings,
            cancelled: Arc::new(AtomicBool::new(false)),
            transfer_pairs: Mutex::new(Vec::new()),
            calculated_weights: Mutex::new(Vec::new()),
            timetables: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

pub struct BuildOutcome {
    pub graph: Graph,
    pub reports: Vec<StageReport>,
}

/// Run all eight stages in order. Returns `Err` as soon as a stage
/// raises a fatal error (`Error::Auth`, `Error::ValidationFailure`,
/// `Error::Cancelled`) — per spec.md §7 these halt the pipeline and no
/// partial artifact is produced.
pub async fn run_build(
    ctx: BuildContext,
    lines: Vec<LineSpec>,
    terminal_hubs: TerminalHubs,
    fallback_allowlist: Vec<FallbackEdge>,
) -> anyhow::Result<BuildOutcome> {
    let mut reports = Vec::new();
    crate::metrics::halted_stage().set(0);

    info!(lines = lines.len(), "starting build pipeline");

    let r1 = timed_stage(1, "base_hub_graph", stage1_base_graph::run(&ctx, &lines))
        .await
        .context("stage 1: base hub graph")?;
    info!(stage = r1.stage, warnings = r1.warnings.len(), "stage complete");
    reports.push(r1);
    bail_if_cancelled(&ctx)?;

    let r2 = timed_stage(2, "proximity_transfers", stage2_proximity_transfers::run(&ctx))
        .await
        .context("stage 2: proximity transfers")?;
    reports.push(r2);
    bail_if_cancelled(&ctx)?;

    let r3 = timed_stage(3, "transfer_weights", stage3_transfer_weights::run(&ctx))
        .await
        .context("stage 3: transfer weights")?;
    reports.push(r3);
    bail_if_cancelled(&ctx)?;

    let r4 = timed_stage(
        4,
        "timetable_fetch",
        stage4_timetable_fetch::run(&ctx, &lines, &terminal_hubs),
    )
    .await
    .context("stage 4: timetable fetch")?;
    reports.push(r4);
    bail_if_cancelled(&ctx)?;

    let r5 = timed_stage(
        5,
        "tube_line_weights",
        stage5_tube_line_weights::run(&ctx, &lines, &fallback_allowlist),
    )
    .await
    .context("stage 5: tube/light-rail line weights")?;
    reports.push(r5);
    bail_if_cancelled(&ctx)?;

    let r6 = timed_stage(6, "other_mode_weights", stage6_other_mode_weights::run(&ctx))
        .await
        .context("stage 6: other-mode line weights")?;
    reports.push(r6);
    bail_if_cancelled(&ctx)?;

    let r7 = timed_stage(7, "validation_gate", stage7_validation_gate::run(&ctx)).await;
    match r7 {
        Ok(report) => reports.push(report),
        Err(e @ Error::ValidationFailure(_)) => {
            error!("validation gate failed: {e}");
            return Err(e).context("stage 7: validation gate");
        }
        Err(e) => return Err(e).context("stage 7: validation gate"),
    }
    bail_if_cancelled(&ctx)?;

    let r8 = timed_stage(8, "graph_merge", stage8_merge::run(&ctx))
        .await
        .context("stage 8: graph merge")?;
    reports.push(r8);

    let graph = ctx.graph.into_inner();
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "build pipeline complete"
    );

    Ok(BuildOutcome { graph, reports })
}

/// Times `fut`, observes it under `meetpoint_stage_duration_seconds{stage}`,
/// and sets the halted-stage gauge to `index` for the duration of a
/// failure (cleared again by the next successful stage, or left in
/// place if `fut` errors and the pipeline unwinds).
async fn timed_stage<T, E>(
    index: i64,
    stage: &str,
    fut: impl std::future::Future<Output = Result<T, E>>,
) -> Result<T, E> {
    let start = std::time::Instant::now();
    let result = fut.await;
    crate::metrics::stage_duration_seconds()
        .with_label_values(&[stage])
        .observe(start.elapsed().as_secs_f64());
    if result.is_err() {
        crate::metrics::halted_stage().set(index);
    }
    result
}

fn bail_if_cancelled(ctx: &BuildContext) -> anyhow::Result<()> {
    if ctx.is_cancelled() {
        anyhow::bail!(Error::Cancelled);
    }
    Ok(())
}
