//! TypeScript/JavaScript element extraction via regex and brace
//! counting — there is no JS/TS AST crate in the corpus either, so
//! this mirrors the original's block-end search rather than a real
//! parse tree.

use dc_core::types::{ContextBlock, ElementType};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)").unwrap())
}

fn arrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:export\s+)?const\s+(\w+)\s*=\s*.*=>").unwrap())
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:export\s+)?class\s+(\w+)").unwrap())
}

fn interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:export\s+)?interface\s+(\w+)").unwrap())
}

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:export\s+)?type\s+(\w+)").unwrap())
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)\s*\(").unwrap())
}

/// Find the 1-indexed end line of a brace-delimited block starting at
/// `start_line` (1-indexed).
fn find_block_end(lines: &[&str], start_line: usize) -> usize {
    let mut brace_count = 0i32;
    let mut found_opening = false;
    for (offset, line) in lines.iter().enumerate().skip(start_line - 1) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    brace_count += 1;
                    found_opening = true;
                }
                '}' => {
                    brace_count -= 1;
                    if found_opening && brace_count == 0 {
                        return offset + 1;
                    }
                }
                _ => {}
            }
        }
    }
    (start_line + 10).min(lines.len())
}

fn extract_dependencies(content: &str) -> HashSet<String> {
    call_re()
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .filter(|name| !is_js_keyword(name))
        .collect()
}

fn is_js_keyword(word: &str) -> bool {
    matches!(
        word,
        "const" | "let" | "var" | "function" | "if" | "else" | "for" | "while" | "return"
    )
}

pub fn extract_elements(source: &str) -> Vec<ContextBlock> {
    let lines: Vec<&str> = source.lines().collect();
    let mut elements = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if let Some(caps) = function_re().captures(line).or_else(|| arrow_re().captures(line)) {
            let name = caps[1].to_string();
            let end_line = find_block_end(&lines, line_no);
            let content = lines[idx..end_line.min(lines.len())].join("\n");
            let dependencies = extract_dependencies(&content);
            elements.push(ContextBlock::new(
                content,
                line_no,
                end_line,
                ElementType::Function,
                name,
                dependencies,
            ));
            continue;
        }

        if let Some(caps) = class_re().captures(line) {
            let name = caps[1].to_string();
            let end_line = find_block_end(&lines, line_no);
            let content = lines[idx..end_line.min(lines.len())].join("\n");
            elements.push(ContextBlock::new(
                content,
                line_no,
                end_line,
                ElementType::Class,
                name,
                HashSet::new(),
            ));
            continue;
        }

        if let Some(caps) = interface_re().captures(line) {
            let name = caps[1].to_string();
            let end_line = find_block_end(&lines, line_no);
            let content = lines[idx..end_line.min(lines.len())].join("\n");
            elements.push(ContextBlock::new(
                content,
                line_no,
                end_line,
                ElementType::Interface,
                name,
                HashSet::new(),
            ));
            continue;
        }

        if let Some(caps) = type_re().captures(line) {
            let name = caps[1].to_string();
            let end_line = find_block_end(&lines, line_no);
            let content = lines[idx..end_line.min(lines.len())].join("\n");
            elements.push(ContextBlock::new(
                content,
                line_no,
                end_line,
                ElementType::Type,
                name,
                HashSet::new(),
            ));
            continue;
        }

        if line.trim_start().starts_with("import ") {
            let dependencies = extract_import_names(line);
            elements.push(ContextBlock::new(
                line.to_string(),
                line_no,
                line_no,
                ElementType::Import,
                format!("import_{line_no}"),
                dependencies,
            ));
        }
    }

    elements
}

fn extract_import_names(line: &str) -> HashSet<String> {
    static NAMED_RE: OnceLock<Regex> = OnceLock::new();
    static FROM_RE: OnceLock<Regex> = OnceLock::new();
    static DEFAULT_RE: OnceLock<Regex> = OnceLock::new();

    let named = NAMED_RE.get_or_init(|| Regex::new(r"\{([^}]+)\}").unwrap());
    let from = FROM_RE.get_or_init(|| Regex::new(r#"from\s+['"]([^'"]+)['"]"#).unwrap());
    let default = DEFAULT_RE.get_or_init(|| Regex::new(r"^import\s+(\w+)").unwrap());

    let mut names = HashSet::new();
    if let Some(caps) = named.captures(line) {
        for part in caps[1].split(',') {
            names.insert(part.trim().to_string());
        }
    }
    if let Some(caps) = from.captures(line) {
        names.insert(caps[1].to_string());
    }
    if let Some(caps) = default.captures(line) {
        names.insert(caps[1].to_string());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_declaration() {
        let source = "export function add(a, b) {\n  return a + b;\n}\n";
        let elements = extract_elements(source);
        let add = elements.iter().find(|e| e.element_name == "add").unwrap();
        assert_eq!(add.element_type, ElementType::Function);
        assert_eq!(add.end_line, 3);
    }

    #[test]
    fn extracts_arrow_function_assigned_to_const() {
        let source = "const double = (x) => {\n  return x * 2;\n}\n";
        let elements = extract_elements(source);
        assert!(elements.iter().any(|e| e.element_name == "double"));
    }

    #[test]
    fn extracts_interface_and_type() {
        let source = "interface User {\n  id: string;\n}\n\ntype Id = string;\n";
        let elements = extract_elements(source);
        assert!(elements
            .iter()
            .any(|e| e.element_name == "User" && e.element_type == ElementType::Interface));
        assert!(elements
            .iter()
            .any(|e| e.element_name == "Id" && e.element_type == ElementType::Type));
    }

    #[test]
    fn extracts_named_import() {
        let source = "import { useState } from 'react';\n";
        let elements = extract_elements(source);
        let import = elements
            .iter()
            .find(|e| e.element_type == ElementType::Import)
            .unwrap();
        assert!(import.dependencies.contains("useState"));
        assert!(import.dependencies.contains("react"));
    }
}
