//! Named tool surface (§4.P): `plan`, `plan_from_scratch`, `code_with_ai`,
//! `code_with_multiple_ai`, `get_cost_summary`, `estimate_task_cost`,
//! `get_budget_status`, `export_cost_report`, `get_system_health`.
//!
//! Planning tools return a fixed advisory text template. Every other
//! tool returns a JSON string; failures are always `{success:false,
//! error, error_type}` rather than a thrown error crossing the
//! boundary.

use dc_agents::dispatch::DispatchEngine;
use dc_core::circuit_breaker::CircuitBreaker;
use dc_core::clock::Clock;
use dc_core::config::ConfigHandle;
use dc_core::ledger::Ledger;
use dc_core::resource_monitor::ResourceMonitor;
use dc_core::types::{Batch, Task};
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub engine: Arc<DispatchEngine>,
    pub ledger: Arc<Ledger>,
    pub config: ConfigHandle,
    pub monitor: Arc<ResourceMonitor>,
    pub breaker: Arc<CircuitBreaker>,
    pub clock: Arc<dyn Clock>,
}

fn failure(error: impl std::fmt::Display, error_type: &str) -> String {
    json!({
        "success": false,
        "error": format!("Error: {error}"),
        "error_type": error_type,
    })
    .to_string()
}

/// `planning`: a fixed advisory template, not JSON.
pub fn planning(prompt: &str) -> String {
    format!(
        "Requirements: {prompt}\n\n\
         Plan the work as small, independent, single-file tasks with no \
         cross-task dependencies. Use `code_with_multiple_ai` to run \
         independent tasks in parallel and `code_with_ai` for a single \
         file. Give each task the interfaces (method names, inputs, \
         outputs) it needs to connect cleanly to the rest."
    )
}

/// `plan_from_scratch`: the advisory template plus a research step for
/// projects with no existing code to anchor on.
pub fn plan_from_scratch(prompt: &str) -> String {
    format!(
        "Requirements: {prompt}\n\n\
         Before planning, research the stated requirements, dependencies \
         and technologies and note them down.\n\n\
         {}",
        planning(prompt)
    )
}

/// `code_with_ai`: run a single task end to end.
pub async fn code_with_ai(state: &AppState, task: Task) -> String {
    if task.working_dir.is_empty() {
        return failure("working_dir is required", "validation_error");
    }
    let result = state.engine.run_single(task, 0).await;
    serde_json::to_string(&result).unwrap_or_else(|e| failure(e, "serialization_error"))
}

/// `code_with_multiple_ai`: run a batch of tasks, parallel or
/// sequential per `batch.parallel`.
pub async fn code_with_multiple_ai(state: &AppState, batch: Batch) -> String {
    if let Err(message) = batch.validate() {
        return failure(message, "validation_error");
    }
    let result = state.engine.run_batch(batch).await;
    serde_json::to_string(&result).unwrap_or_else(|e| failure(e, "serialization_error"))
}

/// `get_cost_summary`: aggregate spend over the trailing `days`.
pub fn get_cost_summary(state: &AppState, days: u32) -> String {
    match state.ledger.get_cost_summary(days, state.clock.now()) {
        Ok(summary) => {
            let average = if summary.task_count > 0 {
                format!("${:.4}", summary.average_cost)
            } else {
                "$0.00".to_string()
            };
            let mut value = serde_json::to_value(&summary).unwrap_or_else(|_| json!({}));
            value["human_summary"] = json!({
                "period": format!("Last {days} days"),
                "total_spent": format!("${:.4}", summary.total_cost),
                "average_per_task": average,
                "total_tokens": summary.total_tokens,
                "tasks_completed": summary.task_count,
            });
            value.to_string()
        }
        Err(err) => failure(format!("failed to get cost summary: {err}"), "ledger_error"),
    }
}

/// `estimate_task_cost`: pre-flight cost projection for `prompt`
/// against the files named by `file_paths`, without running anything.
pub fn estimate_task_cost(state: &AppState, prompt: &str, file_paths: &[String], model: Option<&str>) -> String {
    let config = state.config.current();
    let (chosen_model, kind) = dc_agents::router::select_model(&config.models, prompt, model);

    let mut combined_prompt = prompt.to_string();
    for path in file_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            combined_prompt.push('\n');
            combined_prompt.push_str(&content);
        }
    }

    let estimate = dc_core::cost_gate::estimate(&config.pricing, &combined_prompt, &chosen_model, kind);
    let within_budget = estimate.total_cost <= config.cost.max_cost_per_task;

    json!({
        "success": true,
        "cost_estimate": {
            "total_cost": estimate.total_cost,
            "input_cost": estimate.input_cost,
            "estimated_output_cost": estimate.output_cost,
            "input_tokens": estimate.input_tokens,
            "estimated_output_tokens": estimate.estimated_output_tokens,
            "total_tokens": estimate.input_tokens + estimate.estimated_output_tokens,
            "model": estimate.model,
        },
        "budget_check": {
            "within_budget": within_budget,
            "message": if within_budget {
                "Cost is within budget limits".to_string()
            } else {
                format!("estimated cost ${:.4} exceeds per-task limit ${:.2}", estimate.total_cost, config.cost.max_cost_per_task)
            },
        },
    })
    .to_string()
}

/// `get_budget_status`: configured limits plus today's/this-month's
/// usage against them.
pub fn get_budget_status(state: &AppState) -> String {
    let now = state.clock.now();
    let daily = state.ledger.get_cost_summary(1, now);
    let monthly = state.ledger.get_cost_summary(30, now);

    match (daily, monthly) {
        (Ok(daily), Ok(monthly)) => {
            let config = state.config.current();
            let cost = &config.cost;
            json!({
                "success": true,
                "budget_limits": {
                    "max_cost_per_task": format!("${:.2}", cost.max_cost_per_task),
                    "max_daily_cost": format!("${:.2}", cost.max_daily_cost),
                    "max_monthly_cost": format!("${:.2}", cost.max_monthly_cost),
                    "warning_threshold": format!("${:.2}", cost.warning_threshold),
                },
                "current_usage": {
                    "today": format!("${:.4}", daily.total_cost),
                    "this_month": format!("${:.4}", monthly.total_cost),
                    "tasks_today": daily.task_count,
                    "tasks_this_month": monthly.task_count,
                },
                "remaining_budget": {
                    "daily": format!("${:.2}", (cost.max_daily_cost - daily.total_cost).max(0.0)),
                    "monthly": format!("${:.2}", (cost.max_monthly_cost - monthly.total_cost).max(0.0)),
                },
                "status": {
                    "daily_usage_percent": if cost.max_daily_cost > 0.0 { daily.total_cost / cost.max_daily_cost * 100.0 } else { 0.0 },
                    "monthly_usage_percent": if cost.max_monthly_cost > 0.0 { monthly.total_cost / cost.max_monthly_cost * 100.0 } else { 0.0 },
                },
            })
            .to_string()
        }
        (Err(err), _) | (_, Err(err)) => failure(format!("failed to get budget status: {err}"), "ledger_error"),
    }
}

/// `export_cost_report`: `format` one of `json`, `summary`, `csv`.
pub fn export_cost_report(state: &AppState, days: u32, format: &str) -> String {
    let now = state.clock.now();
    match format {
        "summary" => match state.ledger.get_cost_summary(days, now) {
            Ok(summary) => {
                let mut lines = vec![
                    format!("Cost Report - Last {days} Days"),
                    "=".repeat(40),
                    format!("Total Spent: ${:.4}", summary.total_cost),
                    format!("Tasks Completed: {}", summary.task_count),
                    if summary.task_count > 0 {
                        format!("Average per Task: ${:.4}", summary.average_cost)
                    } else {
                        "Average per Task: $0.00".to_string()
                    },
                    format!("Total Tokens: {}", summary.total_tokens),
                    String::new(),
                    "Cost by Model:".to_string(),
                ];
                for (model, stats) in &summary.cost_by_model {
                    lines.push(format!("  {model}: ${:.4} ({} tasks)", stats.total_cost, stats.task_count));
                }
                lines.join("\n")
            }
            Err(err) => failure(format!("failed to build summary report: {err}"), "ledger_error"),
        },
        "csv" => match state.ledger.export_csv(now) {
            Ok(path) => json!({
                "success": true,
                "message": "Cost data exported to CSV",
                "file": path.to_string_lossy(),
                "period_days": days,
            })
            .to_string(),
            Err(err) => failure(format!("CSV export failed: {err}"), "ledger_error"),
        },
        "json" => match state.ledger.get_cost_summary(days, now) {
            Ok(summary) => serde_json::to_string(&summary).unwrap_or_else(|e| failure(e, "serialization_error")),
            Err(err) => failure(format!("failed to build cost report: {err}"), "ledger_error"),
        },
        other => failure(format!("unknown format: {other}"), "validation_error"),
    }
}

/// `get_system_health`: resource snapshot and circuit breaker state.
pub fn get_system_health(state: &AppState) -> String {
    let snapshot = state.monitor.current();
    let breaker = state.breaker.snapshot();

    json!({
        "success": true,
        "resources": {
            "cpu_percent": snapshot.cpu_percent,
            "memory_percent": snapshot.memory_percent,
            "degraded": snapshot.degraded,
        },
        "circuit_breaker": {
            "state": breaker.state,
            "failure_count": breaker.failure_count,
        },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_core::clock::FixedClock;
    use dc_core::config::{Config, ResilienceConfig};

    fn state_in(dir: &std::path::Path) -> AppState {
        let mut config = Config::default();
        config.general.editor_cli_path = "true".to_string();
        config.cost.enable_cost_tracking = false;
        let config = ConfigHandle::new(config);
        let ledger = Arc::new(Ledger::new(dir.join("ledger")));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(chrono::Utc::now()));
        let breaker = Arc::new(CircuitBreaker::new(Box::new(FixedClock::new(chrono::Utc::now())), 3, 30));
        let engine = Arc::new(DispatchEngine::with_config_handle(
            config.clone(),
            Ledger::new(dir.join("ledger")),
            Box::new(FixedClock::new(chrono::Utc::now())),
            Arc::clone(&breaker),
        ));
        let monitor = Arc::new(ResourceMonitor::spawn(ResilienceConfig::default()));
        AppState { engine, ledger, config, monitor, breaker, clock }
    }

    #[test]
    fn planning_includes_the_prompt() {
        let text = planning("build a snake game");
        assert!(text.contains("build a snake game"));
        assert!(text.contains("code_with_multiple_ai"));
    }

    #[tokio::test]
    async fn code_with_ai_rejects_missing_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let task = Task {
            prompt: "do it".to_string(),
            working_dir: String::new(),
            editable_files: Vec::new(),
            readonly_files: Vec::new(),
            model: None,
            target_elements: None,
        };
        let response = code_with_ai(&state, task).await;
        assert!(response.contains("\"success\":false"));
    }

    #[tokio::test]
    async fn get_cost_summary_reports_zero_for_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let response = get_cost_summary(&state, 7);
        assert!(response.contains("\"total_cost\":0.0") || response.contains("\"total_cost\":0"));
    }

    #[tokio::test]
    async fn get_system_health_reports_closed_breaker() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let response = get_system_health(&state);
        assert!(response.contains("CLOSED"));
    }
}
