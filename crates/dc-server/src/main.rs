//! Dispatch server — routes coding tasks to an editor CLI with budget
//! gating, context pruning, and conflict-aware parallel execution.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use dc_agents::dispatch::DispatchEngine;
use dc_core::circuit_breaker::CircuitBreaker;
use dc_core::clock::{Clock, SystemClock};
use dc_core::config::{Config, ConfigHandle};
use dc_core::ledger::Ledger;
use dc_core::resource_monitor::ResourceMonitor;
use dc_core::types::{Batch, Task};
use dc_server::tools::{self, AppState};
use dc_server::environment;
use std::sync::Arc;
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    environment::configure_app().context("failed to configure application environment")?;
    dc_telemetry::logging::init_logging("dc-server", "info");

    info!("dispatch server starting");

    let overlays = config_overlays();
    let config = Config::load(&overlays).context("failed to load configuration")?;

    std::fs::create_dir_all(&config.cost.ledger_dir)
        .with_context(|| format!("failed to create ledger directory {}", config.cost.ledger_dir))?;

    // Process-wide lifecycle per the concurrency model: load config, open
    // ledger, start resource monitor, construct breaker, construct pool.
    let ledger = Ledger::new(config.cost.ledger_dir.clone());
    let monitor = Arc::new(ResourceMonitor::spawn(config.resilience.clone()));
    let breaker = Arc::new(CircuitBreaker::new(
        Box::new(SystemClock),
        config.resilience.circuit_breaker_failure_threshold,
        config.resilience.circuit_breaker_reset_timeout_secs,
    ));
    let config_handle = ConfigHandle::new(config.clone());
    let engine = Arc::new(DispatchEngine::with_config_handle(
        config_handle.clone(),
        ledger,
        Box::new(SystemClock),
        Arc::clone(&breaker),
    ));

    let state = Arc::new(AppState {
        engine,
        ledger: Arc::new(Ledger::new(config.cost.ledger_dir.clone())),
        config: config_handle.clone(),
        monitor: Arc::clone(&monitor),
        breaker: Arc::clone(&breaker),
        clock: Arc::new(SystemClock) as Arc<dyn Clock>,
    });

    spawn_reload_handler(config_handle);

    let app = build_router(state);

    let bind_addr = "127.0.0.1:0";
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;
    let port = listener.local_addr()?.port();
    info!(port, "dispatch server listening");

    let monitor_for_shutdown = Arc::clone(&monitor);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        monitor_for_shutdown.shutdown();
    });

    axum::serve(listener, app).await.context("dispatch server failed")?;

    info!("dispatch server stopped");
    Ok(())
}

fn config_overlays() -> Vec<std::path::PathBuf> {
    let overlay = Config::default_overlay_path();
    if overlay.exists() {
        vec![overlay]
    } else {
        Vec::new()
    }
}

/// Reload `config_handle` on SIGHUP (§4.A): a malformed overlay file
/// aborts the reload and leaves the prior snapshot serving requests.
#[cfg(unix)]
fn spawn_reload_handler(config_handle: ConfigHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGHUP handler");
                return;
            }
        };
        loop {
            hangup.recv().await;
            match config_handle.reload(&config_overlays()) {
                Ok(()) => info!("configuration reloaded"),
                Err(e) => tracing::error!(error = %e, "configuration reload failed, keeping prior snapshot"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_handler(_config_handle: ConfigHandle) {}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(get_system_health))
        .route("/tools/plan", post(plan))
        .route("/tools/plan_from_scratch", post(plan_from_scratch))
        .route("/tools/code_with_ai", post(code_with_ai))
        .route("/tools/code_with_multiple_ai", post(code_with_multiple_ai))
        .route("/tools/cost_summary", get(get_cost_summary))
        .route("/tools/estimate_cost", post(estimate_task_cost))
        .route("/tools/budget_status", get(get_budget_status))
        .route("/tools/export_cost_report", get(export_cost_report))
        .layer(axum::middleware::from_fn(dc_telemetry::middleware::metrics_middleware))
        .layer(axum::middleware::from_fn(dc_telemetry::tracing_setup::request_id_middleware))
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct PromptRequest {
    prompt: String,
}

async fn plan(Json(req): Json<PromptRequest>) -> String {
    tools::planning(&req.prompt)
}

async fn plan_from_scratch(Json(req): Json<PromptRequest>) -> String {
    tools::plan_from_scratch(&req.prompt)
}

async fn code_with_ai(State(state): State<Arc<AppState>>, Json(task): Json<Task>) -> String {
    tools::code_with_ai(&state, task).await
}

async fn code_with_multiple_ai(State(state): State<Arc<AppState>>, Json(batch): Json<Batch>) -> String {
    tools::code_with_multiple_ai(&state, batch).await
}

#[derive(serde::Deserialize)]
struct DaysQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

async fn get_cost_summary(State(state): State<Arc<AppState>>, query: axum::extract::Query<DaysQuery>) -> String {
    tools::get_cost_summary(&state, query.days)
}

#[derive(serde::Deserialize)]
struct EstimateRequest {
    prompt: String,
    #[serde(default)]
    file_paths: Vec<String>,
    #[serde(default)]
    model: Option<String>,
}

async fn estimate_task_cost(State(state): State<Arc<AppState>>, Json(req): Json<EstimateRequest>) -> String {
    tools::estimate_task_cost(&state, &req.prompt, &req.file_paths, req.model.as_deref())
}

async fn get_budget_status(State(state): State<Arc<AppState>>) -> String {
    tools::get_budget_status(&state)
}

#[derive(serde::Deserialize)]
struct ExportQuery {
    #[serde(default = "default_export_days")]
    days: u32,
    #[serde(default = "default_export_format")]
    format: String,
}

fn default_export_days() -> u32 {
    30
}

fn default_export_format() -> String {
    "json".to_string()
}

async fn export_cost_report(State(state): State<Arc<AppState>>, query: axum::extract::Query<ExportQuery>) -> String {
    tools::export_cost_report(&state, query.days, &query.format)
}

async fn get_system_health(State(state): State<Arc<AppState>>) -> String {
    tools::get_system_health(&state)
}
