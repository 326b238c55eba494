//! Prompt-driven auto-detection of target function/class names (§4.I).

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let raw = [
                r"(?i)(?:fix|update|debug|modify|change|improve|refactor|implement)\s+(?:the\s+)?(\w+)\s+function",
                r"(?i)(?:fix|update|debug|modify|change|improve|refactor|implement)\s+(?:the\s+)?(\w+)\s+method",
                r"(?i)(?:fix|update|debug|modify|change|improve|refactor|implement)\s+(?:the\s+)?(\w+)\s+class",
                r"(?i)(\w+)\s+function\s+(?:has\s+)?(?:a\s+)?(?:bug|issue|problem|error)",
                r"(?i)(\w+)\s+method\s+(?:has\s+)?(?:a\s+)?(?:bug|issue|problem|error)",
                r"(?i)(\w+)\s+class\s+(?:has\s+)?(?:a\s+)?(?:bug|issue|problem|error)",
                r"(?i)(\w+)\s+function\s+(?:is\s+)?(?:not\s+)?(?:working|broken|failing)",
                r"(?i)(\w+)\s+method\s+(?:is\s+)?(?:not\s+)?(?:working|broken|failing)",
                r"(?i)bug\s+in\s+(?:the\s+)?(\w+)\s+function",
                r"(?i)bug\s+in\s+(?:the\s+)?(\w+)\s+method",
                r"(?i)bug\s+in\s+(?:the\s+)?(\w+)\s+class",
                r"(?i)error\s+in\s+(?:the\s+)?(\w+)\s+function",
                r"(?i)error\s+in\s+(?:the\s+)?(\w+)\s+method",
                r"(?i)add\s+(?:a\s+)?(\w+)\s+function",
                r"(?i)create\s+(?:a\s+)?(\w+)\s+function",
                r"(?i)write\s+(?:a\s+)?(\w+)\s+function",
                r"(?i)improve\s+(?:the\s+)?(\w+)\s+function",
                r"(?i)optimize\s+(?:the\s+)?(\w+)\s+function",
                r"(?i)add\s+error\s+handling\s+to\s+(?:the\s+)?(\w+)",
                r"(?i)add\s+(?:\w+\s+)?(?:to\s+)?(?:the\s+)?(\w+)\s+function",
                r"(?i)(?:^|\s)(\w+)\(\)",
                r"(?i)def\s+(\w+)",
                r"(?i)class\s+(\w+)",
            ];
            raw.iter().map(|p| Regex::new(p).unwrap()).collect()
        })
        .as_slice()
}

fn is_common_word(word: &str) -> bool {
    const COMMON_WORDS: &[&str] = &[
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did",
        "will", "would", "could", "should", "can", "may", "might", "must", "this", "that",
        "these", "those", "fix", "bug", "error", "issue", "problem", "update", "change", "add",
        "not", "working", "broken", "failing", "function", "method", "class",
    ];
    COMMON_WORDS.contains(&word.to_lowercase().as_str())
}

/// Extract candidate function/class names from a natural-language
/// prompt, discarding matches shorter than 3 characters or drawn from
/// the common-word stoplist.
pub fn extract_targets_from_prompt(prompt: &str) -> Vec<String> {
    let mut detected: HashSet<String> = HashSet::new();
    for pattern in patterns() {
        for caps in pattern.captures_iter(prompt) {
            if let Some(m) = caps.get(1) {
                let candidate = m.as_str();
                if candidate.len() > 2 && !is_common_word(candidate) {
                    detected.insert(candidate.to_string());
                }
            }
        }
    }
    detected.into_iter().collect()
}

/// Whether `target` is actually defined in `file_content` (Python- or
/// JS/TS-style `def`/`class`/`function` declarations).
pub fn target_exists_in_code(target: &str, file_content: &str) -> bool {
    let def_pattern = format!(r"(?i)def\s+{}\s*\(", regex::escape(target));
    let class_pattern = format!(r"(?i)class\s+{}\b", regex::escape(target));
    let function_pattern = format!(r"(?i)function\s+{}\s*\(", regex::escape(target));

    [def_pattern, class_pattern, function_pattern]
        .iter()
        .any(|pattern| Regex::new(pattern).map(|re| re.is_match(file_content)).unwrap_or(false))
}

/// Detect targets from `prompt`, keeping only those verified to exist
/// in `file_content` when content is provided.
pub fn get_verified_targets(prompt: &str, file_content: Option<&str>) -> Vec<String> {
    let candidates = extract_targets_from_prompt(prompt);
    match file_content {
        Some(content) => candidates
            .into_iter()
            .filter(|target| target_exists_in_code(target, content))
            .collect(),
        None => candidates,
    }
}
