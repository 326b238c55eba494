use dc_agents::dispatch::DispatchEngine;
use dc_core::circuit_breaker::CircuitBreaker;
use dc_core::clock::FixedClock;
use dc_core::config::Config;
use dc_core::ledger::Ledger;
use dc_core::types::{Batch, ConflictHandling, ExecutionType, Task};
use std::sync::Arc;

fn engine_in(dir: &std::path::Path) -> DispatchEngine {
    let mut config = Config::default();
    config.general.editor_cli_path = "true".to_string();
    config.cost.enable_cost_tracking = false;
    let ledger = Ledger::new(dir.join("ledger"));
    let breaker = Arc::new(CircuitBreaker::new(Box::new(FixedClock::new(chrono::Utc::now())), 3, 60));
    DispatchEngine::new(config, ledger, Box::new(FixedClock::new(chrono::Utc::now())), breaker)
}

#[tokio::test]
async fn run_single_succeeds_when_the_editor_cli_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path());

    let task = Task {
        prompt: "add a docstring".to_string(),
        working_dir: dir.path().to_string_lossy().to_string(),
        editable_files: Vec::new(),
        readonly_files: Vec::new(),
        model: Some("claude-sonnet-4".to_string()),
        target_elements: None,
    };

    let result = engine.run_single(task, 0).await;
    assert!(result.success);
    assert_eq!(result.error, None);
    assert_eq!(result.model, "claude-sonnet-4");
}

#[tokio::test]
async fn run_batch_runs_independent_tasks_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path());
    std::fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();

    let batch = Batch {
        prompts: vec!["touch a".to_string(), "touch b".to_string()],
        working_dir: dir.path().to_string_lossy().to_string(),
        editable_files_list: vec![vec!["a.py".to_string()], vec!["b.py".to_string()]],
        readonly_files_list: vec![],
        models: vec![],
        target_elements_list: vec![],
        parallel: true,
        conflict_handling: ConflictHandling::Auto,
        max_workers: None,
    };

    let result = engine.run_batch(batch).await;
    assert!(result.success);
    assert_eq!(result.results.len(), 2);
    assert!(result.success_statuses.iter().all(|s| *s));
    assert!(!result.conflict_info.has_conflicts);
}

#[tokio::test]
async fn run_batch_falls_back_to_sequential_when_conflicts_detected_under_auto() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path());
    std::fs::write(dir.path().join("shared.py"), "def shared():\n    pass\n").unwrap();

    let batch = Batch {
        prompts: vec!["touch shared".to_string(), "also touch shared".to_string()],
        working_dir: dir.path().to_string_lossy().to_string(),
        editable_files_list: vec![vec!["shared.py".to_string()], vec!["shared.py".to_string()]],
        readonly_files_list: vec![],
        models: vec![],
        target_elements_list: vec![],
        parallel: true,
        conflict_handling: ConflictHandling::Auto,
        max_workers: None,
    };

    let result = engine.run_batch(batch).await;
    assert!(result.conflict_info.has_conflicts);
    assert_eq!(result.execution_type, ExecutionType::Sequential);
}

#[tokio::test]
async fn run_batch_runs_sequentially_when_not_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path());

    let batch = Batch {
        prompts: vec!["one".to_string(), "two".to_string(), "three".to_string()],
        working_dir: dir.path().to_string_lossy().to_string(),
        editable_files_list: vec![vec![], vec![], vec![]],
        readonly_files_list: vec![],
        models: vec![],
        target_elements_list: vec![],
        parallel: false,
        conflict_handling: ConflictHandling::Auto,
        max_workers: None,
    };

    let result = engine.run_batch(batch).await;
    assert!(result.success);
    assert_eq!(result.results.len(), 3);
    assert_eq!(result.results[0].task_index, 0);
    assert_eq!(result.results[2].task_index, 2);
}
