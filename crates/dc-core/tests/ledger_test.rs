use chrono::{TimeZone, Utc};
use dc_core::ledger::Ledger;
use dc_core::types::CostRecord;

fn record(task_id: &str, model: &str, at: chrono::DateTime<Utc>, total_cost: f64) -> CostRecord {
    CostRecord {
        task_id: task_id.to_string(),
        task_name: "test task".to_string(),
        model: model.to_string(),
        timestamp: at,
        duration_seconds: 1.5,
        input_tokens: 100,
        output_tokens: 50,
        input_cost: total_cost * 0.6,
        output_cost: total_cost * 0.4,
        total_cost,
    }
}

#[test]
fn round_trips_a_recorded_cost_through_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path());
    let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();

    ledger
        .record_task_cost(record("t1", "gpt-4", now, 0.05))
        .unwrap();
    ledger
        .record_task_cost(record("t2", "gpt-4", now, 0.03))
        .unwrap();

    let summary = ledger.get_cost_summary(30, now).unwrap();
    assert_eq!(summary.task_count, 2);
    assert!((summary.total_cost - 0.08).abs() < 1e-6);
    assert_eq!(summary.cost_by_model["gpt-4"].task_count, 2);
}

#[test]
fn excludes_records_older_than_the_requested_window() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path());
    let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
    let three_months_ago = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    ledger
        .record_task_cost(record("old", "gpt-4", three_months_ago, 1.0))
        .unwrap();
    ledger
        .record_task_cost(record("new", "gpt-4", now, 0.02))
        .unwrap();

    let summary = ledger.get_cost_summary(7, now).unwrap();
    assert_eq!(summary.task_count, 1);
    assert!((summary.total_cost - 0.02).abs() < 1e-6);
}

#[test]
fn backs_up_the_previous_month_file_before_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path());
    let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();

    ledger
        .record_task_cost(record("t1", "gpt-4", now, 0.01))
        .unwrap();
    ledger
        .record_task_cost(record("t2", "gpt-4", now, 0.02))
        .unwrap();

    let backup = dir.path().join("costs_2026-06.json.bak");
    assert!(backup.exists());
}

#[test]
fn exports_recent_months_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path());
    let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();

    ledger
        .record_task_cost(record("t1", "gpt-4", now, 0.01))
        .unwrap();

    let path = ledger.export_csv(now).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("task_id,task_name,model"));
    assert!(contents.contains("t1"));
}
