//! Python element extraction.
//!
//! There is no Python AST crate in the corpus, so extraction uses
//! indentation-aware line scanning instead of a real parse tree: a
//! `def`/`class` block ends at the next line whose indentation is not
//! greater than the header's, mirroring `ast.FunctionDef.end_lineno`
//! closely enough for context selection.

use dc_core::types::{ContextBlock, ElementType};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)def\s+(\w+)\s*\(").unwrap())
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)class\s+(\w+)\s*(?:\(([^)]*)\))?\s*:").unwrap())
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(import\s+.+|from\s+\S+\s+import\s+.+)$").unwrap())
}

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_]\w*)\s*=\s*[^=]").unwrap())
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)\s*\(").unwrap())
}

fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

/// Find the line (1-indexed, inclusive) where the block starting at
/// `start_line` (1-indexed, header indentation `header_indent`) ends.
fn find_block_end(lines: &[&str], start_line: usize, header_indent: usize) -> usize {
    for (offset, line) in lines.iter().enumerate().skip(start_line) {
        if line.trim().is_empty() {
            continue;
        }
        if indentation(line) <= header_indent {
            return offset; // offset is 0-indexed == previous line's 1-indexed number
        }
    }
    lines.len()
}

fn extract_calls(content: &str) -> HashSet<String> {
    call_re()
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .filter(|name| !is_python_keyword(name))
        .collect()
}

fn is_python_keyword(word: &str) -> bool {
    matches!(
        word,
        "if" | "elif"
            | "else"
            | "for"
            | "while"
            | "return"
            | "def"
            | "class"
            | "with"
            | "try"
            | "except"
            | "finally"
            | "import"
            | "from"
            | "not"
            | "and"
            | "or"
            | "in"
            | "is"
            | "lambda"
            | "yield"
            | "print"
    )
}

pub fn extract_elements(source: &str) -> Vec<ContextBlock> {
    let lines: Vec<&str> = source.lines().collect();
    let mut elements = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if let Some(caps) = def_re().captures(line) {
            let indent = caps[1].len();
            let name = caps[2].to_string();
            let end_line = find_block_end(&lines, line_no, indent);
            let content = lines[idx..end_line].join("\n");
            let dependencies = extract_calls(&content);
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
            let indent = caps[1].len();
            let name = caps[2].to_string();
            let end_line = find_block_end(&lines, line_no, indent);
            let content = lines[idx..end_line].join("\n");
            let bases: HashSet<String> = caps
                .get(3)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|b| b.trim().to_string())
                        .filter(|b| !b.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            elements.push(ContextBlock::new(
                content,
                line_no,
                end_line,
                ElementType::Class,
                name,
                bases,
            ));
            continue;
        }

        if import_re().is_match(line) {
            let dependencies = extract_import_names(line);
            elements.push(ContextBlock::new(
                line.to_string(),
                line_no,
                line_no,
                ElementType::Import,
                format!("import_{line_no}"),
                dependencies,
            ));
            continue;
        }

        if indentation(line) == 0 {
            if let Some(caps) = assign_re().captures(line) {
                elements.push(ContextBlock::new(
                    line.to_string(),
                    line_no,
                    line_no,
                    ElementType::Variable,
                    caps[1].to_string(),
                    HashSet::new(),
                ));
            }
        }
    }

    elements
}

fn extract_import_names(line: &str) -> HashSet<String> {
    let trimmed = line.trim();
    let mut names = HashSet::new();
    if let Some(rest) = trimmed.strip_prefix("import ") {
        for part in rest.split(',') {
            names.insert(part.trim().split(" as ").next().unwrap_or("").trim().to_string());
        }
    } else if let Some(rest) = trimmed.strip_prefix("from ") {
        if let Some((module, imports)) = rest.split_once(" import ") {
            names.insert(module.trim().to_string());
            for part in imports.split(',') {
                names.insert(part.trim().split(" as ").next().unwrap_or("").trim().to_string());
            }
        }
    }
    names.retain(|n| !n.is_empty());
    names
}
