//! Monthly JSON cost ledger (§4.C, §6).
//!
//! Costs are persisted as one JSON array-of-records file per calendar
//! month (`costs_YYYY-MM.json`), never SQLite. Every overwrite backs up
//! the previous file to `.bak` first so a crash mid-write can't lose
//! history.

use crate::types::{CostRecord, CostSummary, ModelCostBreakdown};
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse ledger file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub struct Ledger {
    root: PathBuf,
}

impl Ledger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn month_key(at: DateTime<Utc>) -> String {
        format!("{:04}-{:02}", at.year(), at.month())
    }

    fn path_for_month(&self, month_key: &str) -> PathBuf {
        self.root.join(format!("costs_{month_key}.json"))
    }

    fn load_month(&self, month_key: &str) -> Result<Vec<CostRecord>, LedgerError> {
        let path = self.path_for_month(month_key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| LedgerError::Parse { path, source })
    }

    fn save_month(&self, month_key: &str, records: &[CostRecord]) -> Result<(), LedgerError> {
        std::fs::create_dir_all(&self.root).map_err(|source| LedgerError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.path_for_month(month_key);
        if path.exists() {
            let backup = path.with_extension("json.bak");
            std::fs::copy(&path, &backup).map_err(|source| LedgerError::Io {
                path: backup,
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(records).expect("CostRecord always serializes");
        std::fs::write(&path, text).map_err(|source| LedgerError::Io { path, source })
    }

    /// Append a cost record, rounding monetary fields to 8 decimal
    /// places on disk (display-layer rounding happens separately).
    pub fn record_task_cost(&self, mut record: CostRecord) -> Result<(), LedgerError> {
        round_money(&mut record);
        let month_key = Self::month_key(record.timestamp);
        let mut records = self.load_month(&month_key)?;
        records.push(record);
        self.save_month(&month_key, &records)
    }

    /// Load records for the current month and the two prior months,
    /// newest month first.
    fn load_recent_months(&self, now: DateTime<Utc>) -> Result<Vec<CostRecord>, LedgerError> {
        let mut all = Vec::new();
        let mut cursor = now;
        for _ in 0..3 {
            let key = Self::month_key(cursor);
            all.extend(self.load_month(&key)?);
            // Step back to the previous month by going to day 1 and
            // subtracting one day.
            let first_of_month = cursor
                .with_day(1)
                .expect("day 1 always valid");
            cursor = first_of_month - Duration::days(1);
        }
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all)
    }

    pub fn get_cost_summary(&self, days: u32, now: DateTime<Utc>) -> Result<CostSummary, LedgerError> {
        let cutoff = now - Duration::days(days as i64);
        let records: Vec<CostRecord> = self
            .load_recent_months(now)?
            .into_iter()
            .filter(|r| r.timestamp >= cutoff)
            .collect();

        let mut by_model: HashMap<String, ModelCostBreakdown> = HashMap::new();
        let mut total_cost = 0.0;
        let mut total_tokens = 0u64;
        for record in &records {
            total_cost += record.total_cost;
            total_tokens += record.input_tokens + record.output_tokens;
            let entry = by_model.entry(record.model.clone()).or_default();
            entry.total_cost += record.total_cost;
            entry.task_count += 1;
            entry.total_tokens += record.input_tokens + record.output_tokens;
        }

        let task_count = records.len() as u64;
        let average_cost = if task_count > 0 {
            total_cost / task_count as f64
        } else {
            0.0
        };

        Ok(CostSummary {
            total_cost,
            task_count,
            average_cost,
            total_tokens,
            period_days: days,
            cost_by_model: by_model,
        })
    }

    /// Export the current and two prior months to CSV, returning the
    /// written path. Filename format: `cost_export_YYYYMMDD_HHMMSS.csv`.
    pub fn export_csv(&self, now: DateTime<Utc>) -> Result<PathBuf, LedgerError> {
        let records = self.load_recent_months(now)?;
        let filename = format!(
            "cost_export_{:04}{:02}{:02}_{:02}{:02}{:02}.csv",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second()
        );
        let path = self.root.join(filename);
        std::fs::create_dir_all(&self.root).map_err(|source| LedgerError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut csv = String::from(
            "task_id,task_name,model,timestamp,duration_seconds,input_tokens,output_tokens,total_tokens,input_cost,output_cost,total_cost\n",
        );
        for record in &records {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{:.8},{:.8},{:.8}\n",
                csv_escape(&record.task_id),
                csv_escape(&record.task_name),
                csv_escape(&record.model),
                record.timestamp.to_rfc3339(),
                record.duration_seconds,
                record.input_tokens,
                record.output_tokens,
                record.input_tokens + record.output_tokens,
                record.input_cost,
                record.output_cost,
                record.total_cost,
            ));
        }

        std::fs::write(&path, csv).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn round_money(record: &mut CostRecord) {
    record.input_cost = round8(record.input_cost);
    record.output_cost = round8(record.output_cost);
    record.total_cost = round8(record.total_cost);
}

fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}
