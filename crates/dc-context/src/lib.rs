//! Context-aware file pruning: language-aware parsing, relevance
//! scoring, and token-budgeted extraction for coding tasks.

pub mod auto_detect;
pub mod extractor;
pub mod parsers;
pub mod relevance;
