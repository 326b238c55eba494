//! Relevance scoring over the dependency graph (§4.G).

use dc_core::types::{ContextBlock, DependencyGraph, ElementType};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

const SCORE_TARGET_ELEMENT: i32 = 10;
const SCORE_DIRECT_CALLS: i32 = 8;
const SCORE_REVERSE_CALLS: i32 = 7;
const SCORE_SHARED_STATE: i32 = 6;
const SCORE_TYPE_DEFINITIONS: i32 = 5;
const SCORE_IMPORTS: i32 = 4;
const SCORE_CLASS_CONTEXT: i32 = 3;
const SCORE_UNRELATED: i32 = 0;

/// Score every element against `target_names`, keeping only those at or
/// above `min_relevance_score`.
pub fn score_blocks(
    elements: Vec<ContextBlock>,
    target_names: &HashSet<String>,
    dependency_graph: &DependencyGraph,
    min_relevance_score: i32,
) -> Vec<ContextBlock> {
    elements
        .into_iter()
        .filter_map(|mut element| {
            let score = calculate_relevance_score(&element, target_names, dependency_graph);
            if score >= min_relevance_score {
                element.relevance_score = score;
                Some(element)
            } else {
                None
            }
        })
        .collect()
}

fn calculate_relevance_score(
    element: &ContextBlock,
    target_names: &HashSet<String>,
    dependency_graph: &DependencyGraph,
) -> i32 {
    if target_names.contains(&element.element_name) {
        return SCORE_TARGET_ELEMENT;
    }

    if let Some(deps) = dependency_graph.dependencies_of(&element.element_name) {
        if deps.intersection(target_names).next().is_some() {
            return SCORE_DIRECT_CALLS;
        }
    }

    for target_name in target_names {
        if let Some(target_deps) = dependency_graph.dependencies_of(target_name) {
            if target_deps.contains(&element.element_name) {
                return SCORE_REVERSE_CALLS;
            }
        }
    }

    if has_shared_state(element, target_names, dependency_graph) {
        return SCORE_SHARED_STATE;
    }

    if matches!(
        element.element_type,
        ElementType::Interface | ElementType::Type | ElementType::Class
    ) && is_type_used(element, target_names, dependency_graph)
    {
        return SCORE_TYPE_DEFINITIONS;
    }

    if element.element_type == ElementType::Import && is_essential_import(element, target_names, dependency_graph) {
        return SCORE_IMPORTS;
    }

    if element.element_type == ElementType::Class && contains_target_methods(element, target_names, dependency_graph)
    {
        return SCORE_CLASS_CONTEXT;
    }

    SCORE_UNRELATED
}

fn variable_assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\s*=").unwrap())
}

fn extract_variable_names(content: &str) -> HashSet<String> {
    variable_assignment_re()
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

/// `all_blocks` would be required to resolve target content by name;
/// the dependency graph carries the same information via each target's
/// own dependency set, which stands in for "names referenced in the
/// target's body" here since blocks aren't retained after scoring.
fn has_shared_state(element: &ContextBlock, target_names: &HashSet<String>, dependency_graph: &DependencyGraph) -> bool {
    let element_vars = extract_variable_names(&element.content);
    for target_name in target_names {
        if let Some(target_deps) = dependency_graph.dependencies_of(target_name) {
            if element_vars.intersection(target_deps).next().is_some() {
                return true;
            }
        }
    }
    false
}

fn is_type_used(element: &ContextBlock, target_names: &HashSet<String>, dependency_graph: &DependencyGraph) -> bool {
    for target_name in target_names {
        if let Some(target_deps) = dependency_graph.dependencies_of(target_name) {
            if target_deps.contains(&element.element_name) {
                return true;
            }
        }
    }
    false
}

fn is_essential_import(element: &ContextBlock, target_names: &HashSet<String>, dependency_graph: &DependencyGraph) -> bool {
    for target_name in target_names {
        if let Some(target_deps) = dependency_graph.dependencies_of(target_name) {
            if element.dependencies.intersection(target_deps).next().is_some() {
                return true;
            }
        }
    }
    false
}

fn contains_target_methods(element: &ContextBlock, target_names: &HashSet<String>, dependency_graph: &DependencyGraph) -> bool {
    for target_name in target_names {
        if dependency_graph.edges.contains_key(target_name)
            && element.dependencies.contains(target_name)
        {
            return true;
        }
    }
    false
}
