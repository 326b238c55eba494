//! Layered, typed configuration (§4.A).
//!
//! Precedence, lowest to highest: built-in defaults, then environment
//! variables, then zero or more overlay files in ascending priority,
//! then a single explicit final overlay. A later overlay may only
//! override the keys it names — overlays are merged as `toml::Value`
//! tables before the final `Config` deserialization, so an overlay
//! that names only `[cost]` never resets `[resilience]` back to its
//! defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse overlay {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub cost: CostConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub conflict: ConflictConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub features: FeatureFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            models: ModelsConfig::default(),
            pricing: PricingConfig::default(),
            cost: CostConfig::default(),
            resilience: ResilienceConfig::default(),
            context: ContextConfig::default(),
            conflict: ConflictConfig::default(),
            logging: LoggingConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

impl Config {
    /// Build the process-wide snapshot: defaults, then environment
    /// variables, then each overlay file in `overlays` applied in
    /// ascending priority (last one wins).
    pub fn load(overlays: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut value = toml::Value::try_from(Config::default())
            .expect("Config::default() always serializes");
        apply_env_overrides(&mut value);

        for overlay_path in overlays {
            let text = std::fs::read_to_string(overlay_path).map_err(|source| ConfigError::Io {
                path: overlay_path.clone(),
                source,
            })?;
            let overlay: toml::Value =
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: overlay_path.clone(),
                    source,
                })?;
            merge_toml(&mut value, overlay);
        }

        let cfg: Config = value.try_into().map_err(|source| ConfigError::Parse {
            path: overlays.last().cloned().unwrap_or_default(),
            source,
        })?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn default_overlay_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dispatch-server")
            .join("config.toml")
    }
}

/// A live, swappable `Config` snapshot (§4.A): `current()` reads the
/// latest snapshot, `reload()` re-runs `Config::load` and only swaps
/// it in on success, so a malformed overlay file never displaces a
/// previously working configuration.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Config>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn current(&self) -> Config {
        self.inner.read().expect("config lock poisoned").clone()
    }

    /// Reload `overlays` and swap the snapshot in on success. On
    /// failure the prior snapshot is left untouched and the error is
    /// returned to the caller.
    pub fn reload(&self, overlays: &[PathBuf]) -> Result<(), ConfigError> {
        let fresh = Config::load(overlays)?;
        let mut guard = self.inner.write().expect("config lock poisoned");
        *guard = fresh;
        Ok(())
    }
}

/// Recursively merge `overlay` onto `base`: a table key present in
/// `overlay` replaces the corresponding key in `base` (recursing into
/// nested tables); a key `base` has that `overlay` omits is untouched.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_toml(base_value, overlay_value),
                    None => {
                        base_table.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Environment-variable overrides applied on top of defaults, before any
/// overlay file is merged. Mirrors the original Python's `_env_*`
/// dataclass-default helpers (`app/core/config.py`), using a shared
/// `AIDER_*` / `DISPATCH_*` prefix per §6.
fn apply_env_overrides(value: &mut toml::Value) {
    let table = match value.as_table_mut() {
        Some(t) => t,
        None => return,
    };

    if let Some(models) = table.get_mut("models").and_then(|v| v.as_table_mut()) {
        if let Ok(global) = std::env::var("AIDER_MODEL") {
            models.insert(
                "global_override".into(),
                toml::Value::String(global),
            );
        }
        for category in ModelsConfig::CANONICAL_CATEGORIES {
            let env_key = format!("AIDER_MODEL_{}", category.to_uppercase());
            if let Ok(model) = std::env::var(&env_key) {
                if let Some(map) = models
                    .entry("category_models")
                    .or_insert_with(|| toml::Value::Table(Default::default()))
                    .as_table_mut()
                {
                    map.insert((*category).into(), toml::Value::String(model));
                }
            }
        }
    }

    if let Some(cost) = table.get_mut("cost").and_then(|v| v.as_table_mut()) {
        for (env_key, field) in [
            ("AIDER_MAX_COST_PER_TASK", "max_cost_per_task"),
            ("AIDER_MAX_DAILY_COST", "max_daily_cost"),
            ("AIDER_MAX_MONTHLY_COST", "max_monthly_cost"),
            ("AIDER_WARNING_THRESHOLD", "warning_threshold"),
        ] {
            if let Ok(raw) = std::env::var(env_key) {
                if let Ok(parsed) = raw.parse::<f64>() {
                    cost.insert(field.into(), toml::Value::Float(parsed));
                }
            }
        }
    }

    if let Some(resilience) = table.get_mut("resilience").and_then(|v| v.as_table_mut()) {
        for (env_key, field) in [
            ("RESILIENCE_MAX_TASK_QUEUE_SIZE", "max_task_queue_size"),
            ("RESILIENCE_MAX_CONCURRENT_TASKS", "max_concurrent_tasks"),
            (
                "RESILIENCE_CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                "circuit_breaker_failure_threshold",
            ),
        ] {
            if let Ok(raw) = std::env::var(env_key) {
                if let Ok(parsed) = raw.parse::<i64>() {
                    resilience.insert(field.into(), toml::Value::Integer(parsed));
                }
            }
        }
    }

    if let Some(logging) = table.get_mut("logging").and_then(|v| v.as_table_mut()) {
        if let Ok(level) = std::env::var("RUST_LOG") {
            logging.insert("level".into(), toml::Value::String(level));
        }
    }
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_editor_cli_path")]
    pub editor_cli_path: String,
    #[serde(default = "default_vcs_binary")]
    pub vcs_binary: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            editor_cli_path: default_editor_cli_path(),
            vcs_binary: default_vcs_binary(),
        }
    }
}

fn default_service_name() -> String {
    "dispatch-server".into()
}
fn default_editor_cli_path() -> String {
    "aider".into()
}
fn default_vcs_binary() -> String {
    "git".into()
}

/// Model assignments (§4.E): category → model identifier, plus the
/// precedence inputs (explicit argument wins over `global_override`
/// wins over `category_models` match wins over `default_model`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub global_override: Option<String>,
    #[serde(default = "default_category_models")]
    pub category_models: HashMap<String, String>,
}

impl ModelsConfig {
    /// Canonical category set from §4.E; configurable at load (callers
    /// may still name arbitrary extra categories in `category_models`).
    pub const CANONICAL_CATEGORIES: &'static [&'static str] = &[
        "hard",
        "easy",
        "simple",
        "algorithm",
        "testing",
        "documentation",
        "writing",
        "database",
        "api",
        "frontend",
        "backend",
        "css",
        "react",
        "python",
        "javascript",
        "typescript",
        "refactor",
        "optimization",
        "debug",
    ];
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            global_override: None,
            category_models: default_category_models(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".into()
}

fn default_category_models() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("hard".into(), "claude-sonnet-4".into());
    map.insert("easy".into(), "gpt-4.1-nano".into());
    map.insert("simple".into(), "gpt-4.1-nano".into());
    map.insert("algorithm".into(), "claude-sonnet-4".into());
    map.insert("testing".into(), "gpt-4.1-mini".into());
    map.insert("documentation".into(), "gpt-4.1-nano".into());
    map.insert("writing".into(), "gpt-4.1-nano".into());
    map.insert("database".into(), "gpt-4.1-mini".into());
    map.insert("api".into(), "gpt-4.1-mini".into());
    map.insert("frontend".into(), "gemini-2.5-flash".into());
    map.insert("backend".into(), "gpt-4.1-mini".into());
    map.insert("css".into(), "gemini-2.5-flash".into());
    map.insert("react".into(), "gemini-2.5-flash".into());
    map.insert("python".into(), "gpt-4.1-mini".into());
    map.insert("javascript".into(), "gemini-2.5-flash".into());
    map.insert("typescript".into(), "gemini-2.5-flash".into());
    map.insert("refactor".into(), "claude-sonnet-4".into());
    map.insert("optimization".into(), "claude-sonnet-4".into());
    map.insert("debug".into(), "claude-sonnet-4".into());
    map
}

/// Per-model pricing, USD per 1,000,000 tokens (§4.C).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_pricing_table")]
    pub table: HashMap<String, ModelPricing>,
    #[serde(default = "default_unknown_model_pricing")]
    pub unknown_model_fallback: ModelPricing,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            table: default_pricing_table(),
            unknown_model_fallback: default_unknown_model_pricing(),
        }
    }
}

fn default_unknown_model_pricing() -> ModelPricing {
    ModelPricing {
        input: 30.0,
        output: 60.0,
    }
}

/// Seed pricing table recovered from the original `cost_manager.py`
/// `_load_pricing_database` defaults.
fn default_pricing_table() -> HashMap<String, ModelPricing> {
    let mut table = HashMap::new();
    table.insert(
        "gpt-4.1-2025-04-14".into(),
        ModelPricing {
            input: 30.0,
            output: 60.0,
        },
    );
    table.insert(
        "gpt-4.1-mini".into(),
        ModelPricing {
            input: 0.15,
            output: 0.60,
        },
    );
    table.insert(
        "gpt-4.1-nano".into(),
        ModelPricing {
            input: 0.05,
            output: 0.20,
        },
    );
    table.insert(
        "gemini-2.5-pro".into(),
        ModelPricing {
            input: 2.50,
            output: 10.00,
        },
    );
    table.insert(
        "gemini-2.5-flash".into(),
        ModelPricing {
            input: 0.20,
            output: 0.40,
        },
    );
    table.insert(
        "claude-sonnet-4".into(),
        ModelPricing {
            input: 15.00,
            output: 75.00,
        },
    );
    table
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default = "default_max_cost_per_task")]
    pub max_cost_per_task: f64,
    #[serde(default = "default_max_daily_cost")]
    pub max_daily_cost: f64,
    #[serde(default = "default_max_monthly_cost")]
    pub max_monthly_cost: f64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: String,
    #[serde(default = "default_true")]
    pub enable_cost_tracking: bool,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            max_cost_per_task: default_max_cost_per_task(),
            max_daily_cost: default_max_daily_cost(),
            max_monthly_cost: default_max_monthly_cost(),
            warning_threshold: default_warning_threshold(),
            ledger_dir: default_ledger_dir(),
            enable_cost_tracking: true,
        }
    }
}

fn default_max_cost_per_task() -> f64 {
    5.00
}
fn default_max_daily_cost() -> f64 {
    50.00
}
fn default_max_monthly_cost() -> f64 {
    500.00
}
fn default_warning_threshold() -> f64 {
    1.00
}
fn default_ledger_dir() -> String {
    "costs".into()
}
fn default_true() -> bool {
    true
}

/// Resilience thresholds (§4.K, §4.L, §4.M) recovered from
/// `app/core/aider_mcp.py` env-var constants and
/// `app/core/resilience.py` `DEFAULT_RESILIENCE_CONFIG`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default = "default_max_task_queue_size")]
    pub max_task_queue_size: u32,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: u32,
    #[serde(default = "default_circuit_breaker_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_circuit_breaker_reset_timeout_secs")]
    pub circuit_breaker_reset_timeout_secs: u64,
    #[serde(default = "default_cpu_usage_threshold")]
    pub cpu_usage_threshold: f32,
    #[serde(default = "default_memory_usage_threshold")]
    pub memory_usage_threshold: f32,
    #[serde(default = "default_degraded_mode_threshold")]
    pub degraded_mode_threshold: f32,
    #[serde(default = "default_resource_sample_interval_secs")]
    pub resource_sample_interval_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_task_queue_size: default_max_task_queue_size(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            circuit_breaker_failure_threshold: default_circuit_breaker_failure_threshold(),
            circuit_breaker_reset_timeout_secs: default_circuit_breaker_reset_timeout_secs(),
            cpu_usage_threshold: default_cpu_usage_threshold(),
            memory_usage_threshold: default_memory_usage_threshold(),
            degraded_mode_threshold: default_degraded_mode_threshold(),
            resource_sample_interval_secs: default_resource_sample_interval_secs(),
        }
    }
}

fn default_max_task_queue_size() -> u32 {
    10
}
fn default_max_concurrent_tasks() -> u32 {
    5
}
fn default_circuit_breaker_failure_threshold() -> u32 {
    3
}
fn default_circuit_breaker_reset_timeout_secs() -> u64 {
    60
}
fn default_cpu_usage_threshold() -> f32 {
    85.0
}
fn default_memory_usage_threshold() -> f32 {
    90.0
}
fn default_degraded_mode_threshold() -> f32 {
    0.70
}
fn default_resource_sample_interval_secs() -> u64 {
    30
}

/// Default inputs to the context extractor (§4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: i32,
    #[serde(default = "default_true")]
    pub include_imports: bool,
    #[serde(default = "default_true")]
    pub include_type_hints: bool,
    #[serde(default = "default_true")]
    pub preserve_syntax: bool,
    #[serde(default = "default_true")]
    pub enable_extended_js_framework_catalog: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            min_relevance_score: default_min_relevance_score(),
            include_imports: true,
            include_type_hints: true,
            preserve_syntax: true,
            enable_extended_js_framework_catalog: true,
        }
    }
}

fn default_max_tokens() -> usize {
    2000
}
fn default_min_relevance_score() -> i32 {
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictVerbosity {
    Minimal,
    Standard,
    Verbose,
}

impl Default for ConflictVerbosity {
    fn default() -> Self {
        ConflictVerbosity::Standard
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    #[serde(default = "default_true")]
    pub enable_conflict_detection: bool,
    #[serde(default = "default_conflict_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub verbosity: ConflictVerbosity,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            enable_conflict_detection: true,
            timeout_secs: default_conflict_timeout_secs(),
            verbosity: ConflictVerbosity::Standard,
        }
    }
}

fn default_conflict_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    None,
    Daily,
    Size,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy::Daily
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "default_log_root")]
    pub log_root: String,
    #[serde(default)]
    pub rotation_policy: RotationPolicy,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_root: default_log_root(),
            rotation_policy: RotationPolicy::Daily,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_root() -> String {
    "logs".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub cost_tracking: bool,
    #[serde(default = "default_true")]
    pub context_extraction: bool,
    #[serde(default = "default_true")]
    pub target_resolution: bool,
    #[serde(default = "default_true")]
    pub conflict_detection: bool,
    #[serde(default = "default_true")]
    pub auto_detection: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            cost_tracking: true,
            context_extraction: true,
            target_resolution: true,
            conflict_detection: true,
            auto_detection: true,
        }
    }
}
