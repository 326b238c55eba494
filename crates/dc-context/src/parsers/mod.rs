//! Language detection and the parser factory (§4.F).

mod js_ts;
mod python;

use dc_core::types::ContextBlock;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    /// TypeScript and JavaScript share one regex-based parser; the
    /// original treated `JavaScriptParser` as a subclass of
    /// `TypeScriptParser` with no behavioral difference.
    TypeScriptLike,
    Unknown,
}

pub fn detect_language(path: &Path) -> Language {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("py") => Language::Python,
        Some("ts") | Some("tsx") | Some("js") | Some("jsx") => Language::TypeScriptLike,
        _ => Language::Unknown,
    }
}

/// Extract code elements from `source` for `language`. Returns an empty
/// vec for `Language::Unknown` so callers fall back to the full file.
pub fn extract_elements(language: Language, source: &str) -> Vec<ContextBlock> {
    match language {
        Language::Python => python::extract_elements(source),
        Language::TypeScriptLike => js_ts::extract_elements(source),
        Language::Unknown => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_python_by_extension() {
        assert_eq!(detect_language(Path::new("foo/bar.py")), Language::Python);
    }

    #[test]
    fn detects_typescript_and_javascript_as_the_same_language() {
        assert_eq!(
            detect_language(Path::new("a.ts")),
            detect_language(Path::new("a.js"))
        );
    }

    #[test]
    fn unknown_extension_yields_unknown() {
        assert_eq!(detect_language(Path::new("a.rs")), Language::Unknown);
    }
}
