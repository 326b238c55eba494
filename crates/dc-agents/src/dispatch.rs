//! Dispatch core (§4.M): ties model routing, cost gating, context
//! extraction, conflict detection and the editor adapter together into
//! `run_single`/`run_batch`.

use crate::conflict::ConflictDetector;
use crate::{adapter, router};
use dc_context::auto_detect;
use dc_context::extractor::extract_relevant_context;
use dc_core::circuit_breaker::CircuitBreaker;
use dc_core::clock::Clock;
use dc_core::config::{Config, ConfigHandle};
use dc_core::cost_gate::{self, CostGateError};
use dc_core::ledger::Ledger;
use dc_core::types::{
    AutoDetectionInfo, Batch, BatchResult, ConflictHandling, ConflictInfo, CostRecord, ExecutionType, Task, TaskResult,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub struct DispatchEngine {
    config: ConfigHandle,
    ledger: Ledger,
    clock: Box<dyn Clock>,
    breaker: Arc<CircuitBreaker>,
}

impl DispatchEngine {
    pub fn new(config: Config, ledger: Ledger, clock: Box<dyn Clock>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            config: ConfigHandle::new(config),
            ledger,
            clock,
            breaker,
        }
    }

    /// Build from a `ConfigHandle` shared with other parts of the
    /// process, so a live `reload()` is visible to tasks dispatched
    /// after the swap.
    pub fn with_config_handle(config: ConfigHandle, ledger: Ledger, clock: Box<dyn Clock>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            config,
            ledger,
            clock,
            breaker,
        }
    }

    /// Run a single task end to end: route the model, gate on cost,
    /// extract focused context around any auto-detected target, invoke
    /// the editor CLI, and record the spend.
    pub async fn run_single(&self, task: Task, task_index: usize) -> TaskResult {
        let started = Instant::now();
        let config = self.config.current();
        let (model, kind) = router::select_model(&config.models, &task.prompt, task.model.as_deref());

        let auto_detection = self.build_auto_detection(&task);
        let augmented_prompt = self.augment_prompt(&task, &auto_detection, &config);

        let estimate = cost_gate::estimate(&config.pricing, &augmented_prompt, &model, kind);
        if config.cost.enable_cost_tracking {
            let now = self.clock.now();
            match cost_gate::admit(&config.cost, &self.ledger, &estimate, now) {
                Ok((true, warning)) if !warning.is_empty() => {
                    tracing::warn!(task_index, warning, "cost warning");
                }
                Ok((true, _)) => {}
                Ok((false, reason)) => {
                    let message = format!("Task aborted: {reason}");
                    return TaskResult {
                        task_index,
                        prompt: task.prompt,
                        model,
                        editable_files: task.editable_files,
                        success: false,
                        diff: String::new(),
                        details: String::new(),
                        implementation_notes: String::new(),
                        files_modified: Vec::new(),
                        files_attempted: Vec::new(),
                        execution_time: started.elapsed().as_secs_f64(),
                        status_message: message.clone(),
                        cost_info: Some(estimate),
                        auto_detection_info: Some(auto_detection),
                        error: Some(message),
                        error_type: Some("budget_exceeded".to_string()),
                    };
                }
                Err(err) => {
                    return self.ledger_error_result(task, task_index, model, estimate, auto_detection, started, err);
                }
            }
        }

        if !self.breaker.allow_request() {
            return TaskResult {
                task_index,
                prompt: task.prompt,
                model,
                editable_files: task.editable_files,
                success: false,
                diff: String::new(),
                details: String::new(),
                implementation_notes: String::new(),
                files_modified: Vec::new(),
                files_attempted: Vec::new(),
                execution_time: started.elapsed().as_secs_f64(),
                status_message: "Circuit breaker is OPEN".to_string(),
                cost_info: Some(estimate),
                auto_detection_info: Some(auto_detection),
                error: Some("Circuit breaker is OPEN".to_string()),
                error_type: Some("circuit_open".to_string()),
            };
        }

        let working_dir = Path::new(&task.working_dir);
        let run_result = adapter::run(
            &config.general.editor_cli_path,
            working_dir,
            &augmented_prompt,
            &model,
            &task.editable_files,
            &task.readonly_files,
        )
        .await;

        let execution_time = started.elapsed().as_secs_f64();

        match run_result {
            Ok(outcome) => {
                if outcome.success {
                    self.breaker.record_success();
                } else {
                    self.breaker.record_failure();
                }

                if config.cost.enable_cost_tracking {
                    let actual_output_tokens = cost_gate::approximate_output_tokens(&outcome.stdout);
                    let (input_cost, output_cost, total_cost) = dc_core::pricing::calculate_cost(
                        &config.pricing,
                        &model,
                        estimate.input_tokens,
                        actual_output_tokens,
                    );
                    let record = CostRecord {
                        task_id: Uuid::new_v4().to_string(),
                        task_name: dc_core::pricing::generate_task_name(&task.prompt),
                        model: model.clone(),
                        timestamp: self.clock.now(),
                        duration_seconds: execution_time,
                        input_tokens: estimate.input_tokens,
                        output_tokens: actual_output_tokens,
                        input_cost,
                        output_cost,
                        total_cost,
                    };
                    if let Err(err) = self.ledger.record_task_cost(record) {
                        tracing::error!(task_index, %err, "failed to record task cost");
                    }
                }

                TaskResult {
                    task_index,
                    prompt: task.prompt,
                    model,
                    editable_files: task.editable_files.clone(),
                    success: outcome.success,
                    diff: outcome.diff,
                    details: outcome.stdout,
                    implementation_notes: if outcome.meaningful_changes {
                        "Editor reported meaningful changes.".to_string()
                    } else {
                        "Editor ran but produced no meaningful changes.".to_string()
                    },
                    files_modified: if outcome.success { task.editable_files.clone() } else { Vec::new() },
                    files_attempted: task.editable_files,
                    execution_time,
                    status_message: if outcome.success {
                        "completed".to_string()
                    } else {
                        outcome.stderr.clone()
                    },
                    cost_info: Some(estimate),
                    auto_detection_info: Some(auto_detection),
                    error: if outcome.success { None } else { Some(outcome.stderr) },
                    error_type: if outcome.success { None } else { Some("editor_error".to_string()) },
                }
            }
            Err(err) => {
                self.breaker.record_failure();
                TaskResult {
                    task_index,
                    prompt: task.prompt,
                    model,
                    editable_files: task.editable_files.clone(),
                    success: false,
                    diff: String::new(),
                    details: String::new(),
                    implementation_notes: String::new(),
                    files_modified: Vec::new(),
                    files_attempted: task.editable_files,
                    execution_time,
                    status_message: err.to_string(),
                    cost_info: Some(estimate),
                    auto_detection_info: Some(auto_detection),
                    error: Some(err.to_string()),
                    error_type: Some("adapter_error".to_string()),
                }
            }
        }
    }

    /// Run every task in `batch`, sequentially or concurrently per
    /// `batch.parallel`, with conflict detection ahead of parallel runs.
    pub async fn run_batch(&self, batch: Batch) -> BatchResult {
        let started = Instant::now();

        if let Err(message) = batch.validate() {
            return BatchResult {
                success: false,
                results: Vec::new(),
                success_statuses: Vec::new(),
                status_messages: vec![message],
                execution_type: ExecutionType::Sequential,
                execution_time: started.elapsed().as_secs_f64(),
                theoretical_sequential_time: 0.0,
                speedup: 1.0,
                modified_files: Vec::new(),
                conflict_info: ConflictInfo::default(),
                auto_detection_summary: Vec::new(),
            };
        }

        let config = self.config.current();
        let parallel = batch.parallel;
        let conflict_handling = batch.conflict_handling;
        let working_dir = batch.working_dir.clone();
        let tasks = batch.into_tasks();

        let conflict_info = if parallel && !matches!(conflict_handling, ConflictHandling::Ignore) {
            let detector = ConflictDetector::new(working_dir.clone(), config.conflict.clone());
            let task_files: Vec<(String, Vec<String>)> = tasks
                .iter()
                .enumerate()
                .map(|(i, t)| (i.to_string(), t.editable_files.clone()))
                .collect();
            let info = detector.detect_conflicts(&task_files);
            if info.has_conflicts {
                tracing::warn!(report = %detector.generate_report(&info), "file conflicts detected in batch");
            }
            info
        } else {
            ConflictInfo::default()
        };

        // A detected conflict under Auto handling forces a fallback to
        // sequential execution even though the batch asked for parallel.
        let conflict_forces_sequential =
            conflict_info.has_conflicts && matches!(conflict_handling, ConflictHandling::Auto);
        let effective_parallel = parallel && !conflict_forces_sequential;

        let execution_type = if effective_parallel { ExecutionType::Parallel } else { ExecutionType::Sequential };

        let results: Vec<TaskResult> = if effective_parallel {
            let capacity = config.resilience.max_task_queue_size as usize;
            let (accepted, rejected): (Vec<_>, Vec<_>) = tasks
                .into_iter()
                .enumerate()
                .partition(|(i, _)| *i < capacity.max(1));

            let futures = accepted.into_iter().map(|(i, task)| self.run_single(task, i));
            let mut results = futures::future::join_all(futures).await;

            for (i, task) in rejected {
                results.push(self.queue_full_result(task, i));
            }
            results.sort_by_key(|r| r.task_index);
            results
        } else {
            let mut results = Vec::new();
            for (i, task) in tasks.into_iter().enumerate() {
                results.push(self.run_single(task, i).await);
            }
            results
        };

        let execution_time = started.elapsed().as_secs_f64();
        let theoretical_sequential_time: f64 = results.iter().map(|r| r.execution_time).sum();
        let speedup = if execution_time > 0.0 {
            theoretical_sequential_time / execution_time
        } else {
            1.0
        };

        let success_statuses: Vec<bool> = results.iter().map(|r| r.success).collect();
        let status_messages: Vec<String> = results.iter().map(|r| r.status_message.clone()).collect();
        let modified_files: Vec<String> = results.iter().flat_map(|r| r.files_modified.clone()).collect();
        let auto_detection_summary: Vec<AutoDetectionInfo> =
            results.iter().filter_map(|r| r.auto_detection_info.clone()).collect();
        let success = success_statuses.iter().all(|s| *s);

        BatchResult {
            success,
            results,
            success_statuses,
            status_messages,
            execution_type,
            execution_time,
            theoretical_sequential_time,
            speedup,
            modified_files,
            conflict_info,
            auto_detection_summary,
        }
    }

    fn build_auto_detection(&self, task: &Task) -> AutoDetectionInfo {
        if let Some(targets) = &task.target_elements {
            return AutoDetectionInfo {
                auto_detected_targets: Vec::new(),
                context_extraction_used: false,
                files_processed_with_context: 0,
                estimated_token_reduction: "0%".to_string(),
                target_elements_provided: true,
                target_elements_used: targets.clone(),
            };
        }

        let first_file_content = task
            .editable_files
            .first()
            .and_then(|f| std::fs::read_to_string(Path::new(&task.working_dir).join(f)).ok());
        let detected = auto_detect::get_verified_targets(&task.prompt, first_file_content.as_deref());

        AutoDetectionInfo {
            auto_detected_targets: detected.clone(),
            context_extraction_used: !detected.is_empty() && first_file_content.is_some(),
            files_processed_with_context: if detected.is_empty() { 0 } else { task.editable_files.len() },
            estimated_token_reduction: "0%".to_string(),
            target_elements_provided: false,
            target_elements_used: detected,
        }
    }

    /// Append a focused-context excerpt of each editable file around the
    /// detected targets, so the editor CLI gets a smaller, ranked slice
    /// instead of whole files where one is already open.
    fn augment_prompt(&self, task: &Task, auto_detection: &AutoDetectionInfo, config: &dc_core::config::Config) -> String {
        if auto_detection.target_elements_used.is_empty() {
            return task.prompt.clone();
        }

        let mut sections = Vec::new();
        for file in &task.editable_files {
            let full_path = Path::new(&task.working_dir).join(file);
            let Ok(source) = std::fs::read_to_string(&full_path) else {
                continue;
            };
            for target in &auto_detection.target_elements_used {
                let result = extract_relevant_context(&full_path, &source, target, &config.context);
                if !result.fallback_used {
                    sections.push(format!("--- {file} ({target}) ---\n{}", result.focused_context));
                }
            }
        }

        if sections.is_empty() {
            task.prompt.clone()
        } else {
            format!("{}\n\nRelevant context:\n{}", task.prompt, sections.join("\n\n"))
        }
    }

    /// Result for a task that couldn't be admitted because the batch
    /// exceeds `resilience.max_task_queue_size` (§4.M: a full queue
    /// rejects without an exception).
    fn queue_full_result(&self, task: Task, task_index: usize) -> TaskResult {
        TaskResult {
            task_index,
            prompt: task.prompt,
            model: String::new(),
            editable_files: task.editable_files,
            success: false,
            diff: String::new(),
            details: String::new(),
            implementation_notes: String::new(),
            files_modified: Vec::new(),
            files_attempted: Vec::new(),
            execution_time: 0.0,
            status_message: "Rejected due to full task queue.".to_string(),
            cost_info: None,
            auto_detection_info: None,
            error: Some("Rejected due to full task queue.".to_string()),
            error_type: Some("queue_full".to_string()),
        }
    }

    fn ledger_error_result(
        &self,
        task: Task,
        task_index: usize,
        model: String,
        estimate: dc_core::types::CostEstimate,
        auto_detection: AutoDetectionInfo,
        started: Instant,
        err: CostGateError,
    ) -> TaskResult {
        TaskResult {
            task_index,
            prompt: task.prompt,
            model,
            editable_files: task.editable_files,
            success: false,
            diff: String::new(),
            details: String::new(),
            implementation_notes: String::new(),
            files_modified: Vec::new(),
            files_attempted: Vec::new(),
            execution_time: started.elapsed().as_secs_f64(),
            status_message: err.to_string(),
            cost_info: Some(estimate),
            auto_detection_info: Some(auto_detection),
            error: Some(err.to_string()),
            error_type: Some("ledger_error".to_string()),
        }
    }
}
