//! Per-model pricing lookups and cost arithmetic (§4.C).

use crate::config::PricingConfig;
use std::sync::OnceLock;
use std::sync::RwLock;

/// Models we've already logged an "unknown model, using fallback
/// pricing" warning for, so the log isn't repeated per-task.
fn warned_models() -> &'static RwLock<std::collections::HashSet<String>> {
    static WARNED: OnceLock<RwLock<std::collections::HashSet<String>>> = OnceLock::new();
    WARNED.get_or_init(|| RwLock::new(std::collections::HashSet::new()))
}

/// Look up `model`'s per-million-token input/output price, falling back
/// to `pricing.unknown_model_fallback` and logging once per model.
pub fn price_for_model(pricing: &PricingConfig, model: &str) -> (f64, f64) {
    if let Some(entry) = pricing.table.get(model) {
        return (entry.input, entry.output);
    }

    let already_warned = warned_models()
        .read()
        .expect("warned_models lock poisoned")
        .contains(model);
    if !already_warned {
        tracing::warn!(model, "no pricing entry for model, using fallback pricing");
        warned_models()
            .write()
            .expect("warned_models lock poisoned")
            .insert(model.to_string());
    }

    (
        pricing.unknown_model_fallback.input,
        pricing.unknown_model_fallback.output,
    )
}

/// Cost in USD for `input_tokens`/`output_tokens` at `model`'s price.
pub fn calculate_cost(pricing: &PricingConfig, model: &str, input_tokens: u64, output_tokens: u64) -> (f64, f64, f64) {
    let (input_price, output_price) = price_for_model(pricing, model);
    let input_cost = (input_tokens as f64 / 1_000_000.0) * input_price;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * output_price;
    (input_cost, output_cost, input_cost + output_cost)
}

const TASK_NAME_SKIP_WORDS: &[&str] = &[
    "create", "make", "build", "write", "generate", "add", "implement", "a", "an", "the", "for",
    "with", "that", "simple", "basic",
];

/// Derive a short, human-readable `CostRecord.task_name` from a prompt:
/// strip punctuation, drop filler words, title-case the first four
/// remaining words, cap at 50 characters.
pub fn generate_task_name(prompt: &str) -> String {
    let cleaned: String = prompt
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();

    let key_words: Vec<&str> = cleaned
        .split_whitespace()
        .take(10)
        .filter(|w| w.len() > 2 && !TASK_NAME_SKIP_WORDS.contains(w))
        .collect();

    if key_words.is_empty() {
        return "Coding Task".to_string();
    }

    let mut name = String::new();
    for word in key_words.into_iter().take(4) {
        if !name.is_empty() {
            name.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.extend(chars);
        }
    }

    name.chars().take(50).collect()
}
