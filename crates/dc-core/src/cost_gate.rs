//! Budget estimation and admission control (§4.D).

use crate::config::{CostConfig, PricingConfig};
use crate::ledger::{Ledger, LedgerError};
use crate::pricing::calculate_cost;
use crate::token_counter::{count_tokens, estimate_output_tokens};
use crate::types::{CostEstimate, TaskKind};
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum CostGateError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Estimate the cost of running `prompt` against `model`, before the
/// task runs.
pub fn estimate(pricing: &PricingConfig, prompt: &str, model: &str, kind: TaskKind) -> CostEstimate {
    let input_tokens = count_tokens(prompt, model) as u64;
    let estimated_output_tokens = estimate_output_tokens(input_tokens as usize, kind) as u64;
    let (input_cost, output_cost, total_cost) =
        calculate_cost(pricing, model, input_tokens, estimated_output_tokens);
    CostEstimate {
        model: model.to_string(),
        input_tokens,
        estimated_output_tokens,
        input_cost,
        output_cost,
        total_cost,
    }
}

/// Whether `estimate` may proceed given `cost` limits and ledger
/// history. Returns `(admitted, message)`: `message` explains a
/// rejection, or carries a warning when admitted above the warning
/// threshold.
pub fn admit(
    cost: &CostConfig,
    ledger: &Ledger,
    estimate: &CostEstimate,
    now: DateTime<Utc>,
) -> Result<(bool, String), CostGateError> {
    if estimate.total_cost > cost.max_cost_per_task {
        return Ok((
            false,
            format!(
                "estimated cost ${:.4} exceeds per-task limit ${:.2}",
                estimate.total_cost, cost.max_cost_per_task
            ),
        ));
    }

    let daily = ledger.get_cost_summary(1, now)?;
    if daily.total_cost + estimate.total_cost > cost.max_daily_cost {
        return Ok((
            false,
            format!(
                "would exceed daily cost limit ${:.2} (already spent ${:.4} today)",
                cost.max_daily_cost, daily.total_cost
            ),
        ));
    }

    let monthly = ledger.get_cost_summary(30, now)?;
    if monthly.total_cost + estimate.total_cost > cost.max_monthly_cost {
        return Ok((
            false,
            format!(
                "would exceed monthly cost limit ${:.2} (already spent ${:.4} this month)",
                cost.max_monthly_cost, monthly.total_cost
            ),
        ));
    }

    if estimate.total_cost > cost.warning_threshold {
        return Ok((
            true,
            format!(
                "admitted; estimated cost ${:.4} exceeds warning threshold ${:.2}",
                estimate.total_cost, cost.warning_threshold
            ),
        ));
    }

    Ok((true, "admitted".to_string()))
}

/// Approximate output tokens from the actual result text when the
/// provider doesn't report usage, per §4.D (`max(500, len/4)`).
pub fn approximate_output_tokens(result_text: &str) -> u64 {
    (result_text.len() / 4).max(500) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostConfig, PricingConfig};
    use chrono::TimeZone;

    #[test]
    fn rejects_when_over_per_task_limit() {
        let pricing = PricingConfig::default();
        let mut cost = CostConfig::default();
        cost.max_cost_per_task = 0.0000001;
        let ledger_dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(ledger_dir.path());
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();

        let est = estimate(&pricing, "a prompt with a few words", "gpt-4.1-mini", TaskKind::General);
        let (admitted, _) = admit(&cost, &ledger, &est, now).unwrap();
        assert!(!admitted);
    }

    #[test]
    fn admits_small_task_under_defaults() {
        let pricing = PricingConfig::default();
        let cost = CostConfig::default();
        let ledger_dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(ledger_dir.path());
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();

        let est = estimate(&pricing, "small task", "gpt-4.1-nano", TaskKind::Simple);
        let (admitted, _) = admit(&cost, &ledger, &est, now).unwrap();
        assert!(admitted);
    }

    #[test]
    fn approximate_output_tokens_has_floor() {
        assert_eq!(approximate_output_tokens("short"), 500);
    }
}
