//! Context extraction pipeline (§4.H): parse, score, select within a
//! token budget, then restore syntactic completeness.

use crate::parsers::{self, Language};
use crate::relevance;
use dc_core::config::ContextConfig;
use dc_core::types::{ContextBlock, DependencyGraph, ElementType};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ExtractionStats {
    pub original_tokens: usize,
    pub focused_tokens: usize,
    pub original_lines: usize,
    pub focused_lines: usize,
    pub reduction_ratio: f64,
    pub token_savings: i64,
    pub line_reduction: i64,
    pub blocks_selected: usize,
    pub token_budget_used: f64,
}

/// A suggested edit location for a matched target block.
#[derive(Debug, Clone)]
pub struct EditSuggestion {
    pub element_name: String,
    pub element_type: ElementType,
    pub start_line: usize,
    pub end_line: usize,
    pub suggestion: String,
}

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub focused_context: String,
    pub stats: ExtractionStats,
    /// Each target element's own dependency names, for callers that
    /// want a user-facing view of what the focused context pulled in.
    pub dependency_map: HashMap<String, Vec<String>>,
    pub suggested_edits: Vec<EditSuggestion>,
    pub language: Language,
    pub target_elements: Vec<String>,
    pub original_file: PathBuf,
    pub fallback_used: bool,
}

fn build_dependency_graph(elements: &[ContextBlock]) -> DependencyGraph {
    let mut edges = std::collections::HashMap::new();
    for element in elements {
        edges.insert(element.element_name.clone(), element.dependencies.clone());
    }
    DependencyGraph { edges }
}

fn find_target_elements(elements: &[ContextBlock], target: &str) -> Vec<ContextBlock> {
    if let Some((class_name, method_name)) = target.split_once('.') {
        return elements
            .iter()
            .filter(|e| {
                e.element_name == method_name
                    && elements.iter().any(|c| {
                        c.element_type == ElementType::Class
                            && c.element_name == class_name
                            && c.start_line <= e.start_line
                            && e.start_line <= c.end_line
                    })
            })
            .cloned()
            .collect();
    }
    elements.iter().filter(|e| e.element_name == target).cloned().collect()
}

/// Select the highest-scoring blocks that fit within `max_tokens`,
/// allowing essential imports (score >= 8) up to a 10% overage.
fn select_blocks_within_budget(mut scored: Vec<ContextBlock>, max_tokens: usize) -> Vec<ContextBlock> {
    scored.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

    let mut selected = Vec::new();
    let mut total_tokens = 0usize;
    let overage_budget = (max_tokens as f64 * 1.1) as usize;

    for block in scored {
        if total_tokens + block.token_count <= max_tokens {
            total_tokens += block.token_count;
            selected.push(block);
        } else if block.element_type == ElementType::Import
            && block.relevance_score >= 8
            && total_tokens + block.token_count <= overage_budget
        {
            total_tokens += block.token_count;
            selected.push(block);
        }
    }

    selected
}

fn ensure_syntactic_completeness(
    mut selected: Vec<ContextBlock>,
    all_elements: &[ContextBlock],
    config: &ContextConfig,
) -> Vec<ContextBlock> {
    if !config.preserve_syntax {
        return selected;
    }

    if config.include_imports {
        let selected_names: HashSet<String> = selected.iter().map(|b| b.element_name.clone()).collect();
        for import_block in all_elements.iter().filter(|e| e.element_type == ElementType::Import) {
            if selected_names.contains(&import_block.element_name) {
                continue;
            }
            let needed = selected
                .iter()
                .any(|b| import_block.dependencies.iter().any(|dep| b.content.contains(dep)));
            if needed {
                selected.push(import_block.clone());
            }
        }
    }

    let mut with_class_headers = selected.clone();
    for block in &selected {
        if block.element_type == ElementType::Method {
            if let Some(class_block) = all_elements.iter().find(|e| {
                e.element_type == ElementType::Class && e.start_line <= block.start_line && block.start_line <= e.end_line
            }) {
                if !with_class_headers.iter().any(|b| b.element_name == class_block.element_name) {
                    with_class_headers.push(minimal_class_header(class_block));
                }
            }
        }
    }

    with_class_headers
}

fn minimal_class_header(class_block: &ContextBlock) -> ContextBlock {
    let header_line = class_block
        .content
        .lines()
        .find(|l| l.trim_start().starts_with("class "))
        .unwrap_or(&class_block.content);
    let content = format!("{header_line}\n    // ... methods extracted below ...\n");
    let mut block = ContextBlock::new(
        content,
        class_block.start_line,
        class_block.start_line + 1,
        ElementType::ClassHeader,
        class_block.element_name.clone(),
        HashSet::new(),
    );
    block.relevance_score = 5;
    block
}

fn blocks_to_context(mut blocks: Vec<ContextBlock>) -> String {
    blocks.sort_by_key(|b| b.start_line);
    blocks
        .into_iter()
        .map(|b| b.content)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Run the full extraction pipeline over `source` for `target_element`.
/// Falls back to the entire file when the language is unrecognized or
/// the target isn't found.
pub fn extract_relevant_context(
    file_path: &Path,
    source: &str,
    target_element: &str,
    config: &ContextConfig,
) -> ExtractionResult {
    let language = parsers::detect_language(file_path);
    let original_tokens = source.split_whitespace().count();

    if language == Language::Unknown {
        return fallback_full_file(file_path, source, language, original_tokens);
    }

    let elements = parsers::extract_elements(language, source);
    let target_blocks = find_target_elements(&elements, target_element);
    if target_blocks.is_empty() {
        return fallback_full_file(file_path, source, language, original_tokens);
    }

    let dependency_graph = build_dependency_graph(&elements);
    let target_names: HashSet<String> = target_blocks.iter().map(|b| b.element_name.clone()).collect();

    let scored = relevance::score_blocks(elements.clone(), &target_names, &dependency_graph, config.min_relevance_score);
    let selected = select_blocks_within_budget(scored, config.max_tokens);
    let complete = ensure_syntactic_completeness(selected, &elements, config);

    let dependency_map = create_dependency_map(&dependency_graph, &target_blocks);
    let suggested_edits = suggest_edit_locations(&complete, target_element);

    let blocks_selected = complete.len();
    let original_lines = source.lines().count();
    let focused_context = blocks_to_context(complete);
    let focused_tokens = focused_context.split_whitespace().count();
    let focused_lines = focused_context.lines().count();

    ExtractionResult {
        focused_context,
        stats: ExtractionStats {
            original_tokens,
            focused_tokens,
            original_lines,
            focused_lines,
            reduction_ratio: if original_tokens > 0 {
                focused_tokens as f64 / original_tokens as f64
            } else {
                0.0
            },
            token_savings: original_tokens as i64 - focused_tokens as i64,
            line_reduction: original_lines as i64 - focused_lines as i64,
            blocks_selected,
            token_budget_used: if config.max_tokens > 0 {
                focused_tokens as f64 / config.max_tokens as f64
            } else {
                0.0
            },
        },
        dependency_map,
        suggested_edits,
        language,
        target_elements: target_names.into_iter().collect(),
        original_file: file_path.to_path_buf(),
        fallback_used: false,
    }
}

/// A user-facing view of each target's own dependency names.
fn create_dependency_map(graph: &DependencyGraph, target_blocks: &[ContextBlock]) -> HashMap<String, Vec<String>> {
    target_blocks
        .iter()
        .map(|target| {
            let deps = graph.edges.get(&target.element_name).cloned().unwrap_or_default();
            (target.element_name.clone(), deps.into_iter().collect())
        })
        .collect()
}

/// Suggest edit locations for blocks whose name matches `target_element`
/// exactly (a dotted `Class.method` target never matches a bare element
/// name, mirroring the original's literal comparison).
fn suggest_edit_locations(blocks: &[ContextBlock], target_element: &str) -> Vec<EditSuggestion> {
    blocks
        .iter()
        .filter(|b| b.element_name == target_element)
        .map(|b| EditSuggestion {
            element_name: b.element_name.clone(),
            element_type: b.element_type,
            start_line: b.start_line,
            end_line: b.end_line,
            suggestion: format!(
                "Consider modifying {:?} '{}' at lines {}-{}",
                b.element_type, b.element_name, b.start_line, b.end_line
            ),
        })
        .collect()
}

fn fallback_full_file(file_path: &Path, source: &str, language: Language, original_tokens: usize) -> ExtractionResult {
    let lines = source.lines().count();
    ExtractionResult {
        focused_context: source.to_string(),
        stats: ExtractionStats {
            original_tokens,
            focused_tokens: original_tokens,
            original_lines: lines,
            focused_lines: lines,
            reduction_ratio: 1.0,
            token_savings: 0,
            line_reduction: 0,
            blocks_selected: 1,
            token_budget_used: 0.0,
        },
        dependency_map: HashMap::new(),
        suggested_edits: Vec::new(),
        language,
        target_elements: Vec::new(),
        original_file: file_path.to_path_buf(),
        fallback_used: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_core::config::ContextConfig;
    use std::path::PathBuf;

    #[test]
    fn finds_target_function_and_its_caller() {
        let source = "def helper():\n    return 1\n\ndef target():\n    return helper()\n";
        let config = ContextConfig::default();
        let result = extract_relevant_context(&PathBuf::from("a.py"), source, "target", &config);
        assert!(!result.fallback_used);
        assert!(result.focused_context.contains("def target"));
    }

    #[test]
    fn falls_back_to_full_file_when_target_missing() {
        let source = "def helper():\n    return 1\n";
        let config = ContextConfig::default();
        let result = extract_relevant_context(&PathBuf::from("a.py"), source, "nonexistent", &config);
        assert!(result.fallback_used);
        assert_eq!(result.focused_context, source);
    }

    #[test]
    fn falls_back_for_unknown_language() {
        let source = "fn main() {}\n";
        let config = ContextConfig::default();
        let result = extract_relevant_context(&PathBuf::from("a.rs"), source, "main", &config);
        assert!(result.fallback_used);
    }
}
