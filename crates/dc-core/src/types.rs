//! Domain types shared across the dispatch server: tasks, batches, cost
//! records, and the small state types owned by the circuit breaker and
//! resource monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// An opaque model identifier understood by the editor CLI
/// (e.g. `"claude-sonnet-4"`, `"gpt-4.1-mini"`). Never parsed, only
/// matched against the pricing table and passed through.
pub type ModelIdentifier = String;

// ---------------------------------------------------------------------------
// Cost accounting
// ---------------------------------------------------------------------------

/// A single persisted cost row, written to the monthly ledger at the end
/// of a task's execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostRecord {
    pub task_id: String,
    pub task_name: String,
    pub model: ModelIdentifier,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CostRecord {
    /// `total_cost = input_cost + output_cost` within floating-point slop.
    pub fn is_internally_consistent(&self) -> bool {
        (self.total_cost - (self.input_cost + self.output_cost)).abs() < 1e-9
    }
}

/// Pre-execution cost projection. Mirrors `CostRecord` but is never
/// persisted and carries an estimate rather than a measured token count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model: ModelIdentifier,
    pub input_tokens: u64,
    pub estimated_output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Flat record of the four USD budget thresholds, global for the process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetLimits {
    pub max_cost_per_task: f64,
    pub max_daily_cost: f64,
    pub max_monthly_cost: f64,
    pub warning_threshold: f64,
}

/// Aggregate view over a window of `CostRecord`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost: f64,
    pub task_count: u64,
    pub average_cost: f64,
    pub total_tokens: u64,
    pub period_days: u32,
    pub cost_by_model: HashMap<ModelIdentifier, ModelCostBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelCostBreakdown {
    pub total_cost: f64,
    pub task_count: u64,
    pub total_tokens: u64,
}

/// Task-kind classification used by the output-token estimator (§4.B)
/// and by the model router's category scoring (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CodeGeneration,
    Documentation,
    Testing,
    Refactor,
    Debug,
    Simple,
    General,
}

impl Default for TaskKind {
    fn default() -> Self {
        TaskKind::General
    }
}

// ---------------------------------------------------------------------------
// Context extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Function,
    Method,
    Class,
    ClassHeader,
    Interface,
    Type,
    Import,
    Variable,
}

/// A parsed, scoreable slice of a source file. Produced by the language
/// parsers (§4.F); mutated only by the relevance scorer (assigning
/// `relevance_score`) and the completeness pass (inserting synthetic
/// `class_header` blocks). Torn down once extraction completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlock {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub element_type: ElementType,
    pub element_name: String,
    pub relevance_score: i32,
    pub dependencies: HashSet<String>,
    pub token_count: usize,
}

impl ContextBlock {
    pub fn new(
        content: impl Into<String>,
        start_line: usize,
        end_line: usize,
        element_type: ElementType,
        element_name: impl Into<String>,
        dependencies: HashSet<String>,
    ) -> Self {
        let content = content.into();
        let token_count = content.split_whitespace().count().max(1);
        Self {
            content,
            start_line,
            end_line,
            element_type,
            element_name: element_name.into(),
            relevance_score: 0,
            dependencies,
            token_count,
        }
    }
}

/// Mapping from element name to the set of names it references (calls,
/// type mentions, inheritance, import identifiers). Read-only to the
/// scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub edges: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    pub fn dependencies_of(&self, name: &str) -> Option<&HashSet<String>> {
        self.edges.get(name)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A single coding request. Editable/readonly paths are interpreted
/// relative to `working_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub prompt: String,
    pub working_dir: String,
    #[serde(default)]
    pub editable_files: Vec<String>,
    #[serde(default)]
    pub readonly_files: Vec<String>,
    #[serde(default)]
    pub model: Option<ModelIdentifier>,
    #[serde(default)]
    pub target_elements: Option<Vec<String>>,
}

/// Parallel lists of per-task fields. All lists must be equal length;
/// a length mismatch is a fatal validation error (checked by
/// `Batch::validate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub prompts: Vec<String>,
    pub working_dir: String,
    pub editable_files_list: Vec<Vec<String>>,
    #[serde(default)]
    pub readonly_files_list: Vec<Vec<String>>,
    #[serde(default)]
    pub models: Vec<Option<ModelIdentifier>>,
    #[serde(default)]
    pub target_elements_list: Vec<Option<Vec<String>>>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub conflict_handling: ConflictHandling,
    #[serde(default)]
    pub max_workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictHandling {
    Auto,
    Warn,
    Ignore,
}

impl Default for ConflictHandling {
    fn default() -> Self {
        ConflictHandling::Auto
    }
}

impl Batch {
    /// Errors with the mismatched field name when list lengths diverge.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.prompts.len();
        if self.editable_files_list.len() != n {
            return Err(format!(
                "editable_files_list length {} does not match prompts length {}",
                self.editable_files_list.len(),
                n
            ));
        }
        if !self.readonly_files_list.is_empty() && self.readonly_files_list.len() != n {
            return Err(format!(
                "readonly_files_list length {} does not match prompts length {}",
                self.readonly_files_list.len(),
                n
            ));
        }
        if !self.models.is_empty() && self.models.len() != n {
            return Err(format!(
                "models length {} does not match prompts length {}",
                self.models.len(),
                n
            ));
        }
        if !self.target_elements_list.is_empty() && self.target_elements_list.len() != n {
            return Err(format!(
                "target_elements_list length {} does not match prompts length {}",
                self.target_elements_list.len(),
                n
            ));
        }
        Ok(())
    }

    /// Expand into per-task `Task` values, one per prompt.
    pub fn into_tasks(self) -> Vec<Task> {
        let n = self.prompts.len();
        let readonly = if self.readonly_files_list.is_empty() {
            vec![Vec::new(); n]
        } else {
            self.readonly_files_list
        };
        let models = if self.models.is_empty() {
            vec![None; n]
        } else {
            self.models
        };
        let targets = if self.target_elements_list.is_empty() {
            vec![None; n]
        } else {
            self.target_elements_list
        };
        self.prompts
            .into_iter()
            .zip(self.editable_files_list)
            .zip(readonly)
            .zip(models)
            .zip(targets)
            .map(|((((prompt, editable_files), readonly_files), model), target_elements)| Task {
                prompt,
                working_dir: self.working_dir.clone(),
                editable_files,
                readonly_files,
                model,
                target_elements,
            })
            .collect()
    }
}

/// Auto-detection / context-extraction metadata attached to a task result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoDetectionInfo {
    pub auto_detected_targets: Vec<String>,
    pub context_extraction_used: bool,
    pub files_processed_with_context: usize,
    pub estimated_token_reduction: String,
    pub target_elements_provided: bool,
    pub target_elements_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_index: usize,
    pub prompt: String,
    pub model: ModelIdentifier,
    pub editable_files: Vec<String>,
    pub success: bool,
    pub diff: String,
    pub details: String,
    pub implementation_notes: String,
    pub files_modified: Vec<String>,
    pub files_attempted: Vec<String>,
    pub execution_time: f64,
    pub status_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_info: Option<CostEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_detection_info: Option<AutoDetectionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub has_conflicts: bool,
    pub conflicting_files: Vec<String>,
    pub conflict_matrix: Vec<TaskPairConflict>,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPairConflict {
    pub task_a: usize,
    pub task_b: usize,
    pub shared_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,
    pub results: Vec<TaskResult>,
    pub success_statuses: Vec<bool>,
    pub status_messages: Vec<String>,
    pub execution_type: ExecutionType,
    pub execution_time: f64,
    pub theoretical_sequential_time: f64,
    pub speedup: f64,
    pub modified_files: Vec<String>,
    pub conflict_info: ConflictInfo,
    pub auto_detection_summary: Vec<AutoDetectionInfo>,
}

// ---------------------------------------------------------------------------
// Resilience state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
        }
    }
}

/// Rolling CPU/memory snapshot written by the resource monitor (§4.L).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub degraded: bool,
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            memory_percent: 0.0,
            degraded: false,
        }
    }
}
