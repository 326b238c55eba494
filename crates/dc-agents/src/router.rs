//! Keyword-category model routing (§4.E).

use dc_core::config::ModelsConfig;
use dc_core::types::TaskKind;

fn category_keywords(category: &str) -> &'static [&'static str] {
    match category {
        "hard" => &["complex", "advanced", "sophisticated", "intricate", "challenging"],
        "easy" => &["simple", "basic", "quick", "easy", "straightforward", "minimal"],
        "simple" => &["simple", "basic", "quick", "easy", "straightforward", "minimal"],
        "algorithm" => &["algorithm", "data structure", "sorting", "searching"],
        "testing" => &["test", "unittest", "pytest", "spec", "assertion", "mock"],
        "documentation" => &["documentation", "readme", "docs", "comment", "explain"],
        "writing" => &["write", "content", "article", "blog", "copy", "text"],
        "database" => &["database", "sql", "query", "orm", "migration", "schema"],
        "api" => &["api", "endpoint", "rest", "graphql", "request", "response"],
        "frontend" => &["frontend", "ui", "interface", "component", "view"],
        "backend" => &["backend", "server", "service", "logic", "business"],
        "css" => &["css", "style", "styling", "animation", "layout", "design"],
        "react" => &["react", "jsx", "component", "hook", "state"],
        "python" => &["python", "py", "django", "flask", "fastapi"],
        "javascript" => &["javascript", "js", "node", "npm"],
        "typescript" => &["typescript", "ts", "tsx", "interface", "generic"],
        "refactor" => &["refactor", "cleanup", "reorganize", "restructure"],
        "optimization" => &["optimize", "performance", "speed", "efficient"],
        "debug" => &["debug", "fix", "error", "bug", "issue", "problem"],
        _ => &[],
    }
}

/// Category-to-`TaskKind` mapping used to feed the token/cost estimator
/// once a category has been picked (§4.B, §4.D).
fn category_task_kind(category: &str) -> TaskKind {
    match category {
        "testing" => TaskKind::Testing,
        "documentation" | "writing" => TaskKind::Documentation,
        "refactor" => TaskKind::Refactor,
        "debug" => TaskKind::Debug,
        "easy" | "simple" => TaskKind::Simple,
        "hard" | "algorithm" | "database" | "api" | "frontend" | "backend" | "css" | "react"
        | "python" | "javascript" | "typescript" | "optimization" => TaskKind::CodeGeneration,
        _ => TaskKind::General,
    }
}

/// Pick the category with the highest keyword score, ties broken by
/// `CANONICAL_CATEGORIES` declaration order (first-declared wins) —
/// a manual fold rather than `max_by_key`, whose last-wins tie-break
/// would invert that order.
fn best_category(prompt_lower: &str) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for category in ModelsConfig::CANONICAL_CATEGORIES.iter() {
        let score = category_keywords(category)
            .iter()
            .filter(|kw| prompt_lower.contains(*kw))
            .count();
        if score == 0 {
            continue;
        }
        if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
            best = Some((category, score));
        }
    }
    best.map(|(category, _)| category)
}

/// Choose a model for `prompt`. Precedence: `explicit_model` argument,
/// then `models.global_override`, then the highest-scoring category
/// match, then `models.default_model`.
pub fn select_model(models: &ModelsConfig, prompt: &str, explicit_model: Option<&str>) -> (String, TaskKind) {
    if let Some(model) = explicit_model {
        return (model.to_string(), classify_task_kind(prompt));
    }
    if let Some(global) = &models.global_override {
        return (global.clone(), classify_task_kind(prompt));
    }

    let prompt_lower = prompt.to_lowercase();
    match best_category(&prompt_lower) {
        Some(category) => (
            models
                .category_models
                .get(category)
                .cloned()
                .unwrap_or_else(|| models.default_model.clone()),
            category_task_kind(category),
        ),
        None => (models.default_model.clone(), TaskKind::General),
    }
}

fn classify_task_kind(prompt: &str) -> TaskKind {
    let prompt_lower = prompt.to_lowercase();
    best_category(&prompt_lower).map(category_task_kind).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_model_always_wins() {
        let models = ModelsConfig::default();
        let (chosen, _) = select_model(&models, "fix the bug", Some("custom-model"));
        assert_eq!(chosen, "custom-model");
    }

    #[test]
    fn global_override_wins_over_category_match() {
        let mut models = ModelsConfig::default();
        models.global_override = Some("override-model".into());
        let (chosen, _) = select_model(&models, "fix the bug", None);
        assert_eq!(chosen, "override-model");
    }

    #[test]
    fn debug_keywords_route_to_debug_category_model() {
        let models = ModelsConfig::default();
        let (chosen, kind) = select_model(&models, "there is a bug in this function", None);
        assert_eq!(chosen, models.category_models["debug"]);
        assert_eq!(kind, TaskKind::Debug);
    }

    #[test]
    fn no_keyword_match_falls_back_to_default_model() {
        let models = ModelsConfig::default();
        let (chosen, kind) = select_model(&models, "hello there", None);
        assert_eq!(chosen, models.default_model);
        assert_eq!(kind, TaskKind::General);
    }

    #[test]
    fn highest_scoring_category_wins_over_ties() {
        let models = ModelsConfig::default();
        let (chosen, _) = select_model(&models, "optimize performance speed efficient code", None);
        assert_eq!(chosen, models.category_models["optimization"]);
    }

    #[test]
    fn equal_score_tie_resolves_to_earlier_declared_category() {
        // "component" scores 1 for both "frontend" and "react"; "frontend"
        // is declared first in CANONICAL_CATEGORIES and must win the tie.
        let models = ModelsConfig::default();
        let (chosen, _) = select_model(&models, "component", None);
        assert_eq!(chosen, models.category_models["frontend"]);
    }
}
