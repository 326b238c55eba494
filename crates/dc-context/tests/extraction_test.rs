use dc_context::extractor::extract_relevant_context;
use dc_core::config::ContextConfig;
use std::path::PathBuf;

const PYTHON_MODULE: &str = "\
import os
import json

def unrelated_helper():
    return os.getpid()

class UserService:
    def __init__(self, db):
        self.db = db

    def get_user(self, user_id):
        return self.db.fetch(user_id)

    def delete_user(self, user_id):
        return self.db.remove(user_id)

def process_users(service):
    return service.get_user(1)
";

#[test]
fn extracts_a_targeted_method_without_unrelated_functions() {
    let config = ContextConfig::default();
    let result = extract_relevant_context(&PathBuf::from("users.py"), PYTHON_MODULE, "get_user", &config);

    assert!(!result.fallback_used);
    assert!(result.focused_context.contains("def get_user"));
    assert!(!result.focused_context.contains("def unrelated_helper"));
}

#[test]
fn includes_the_caller_of_a_targeted_function() {
    let config = ContextConfig::default();
    let result = extract_relevant_context(&PathBuf::from("users.py"), PYTHON_MODULE, "process_users", &config);

    assert!(!result.fallback_used);
    assert!(result.focused_context.contains("def process_users"));
}

#[test]
fn reduces_token_count_relative_to_the_whole_file() {
    let config = ContextConfig::default();
    let result = extract_relevant_context(&PathBuf::from("users.py"), PYTHON_MODULE, "delete_user", &config);

    assert!(!result.fallback_used);
    assert!(result.stats.focused_tokens < result.stats.original_tokens);
    assert!(result.stats.reduction_ratio < 1.0);
}
