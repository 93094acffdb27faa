//! Global configuration types for FlowForge.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! correction bound, the generator endpoint, and simulator behaviour.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.flowforge/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Correction retries after the first generation attempt.
    #[serde(default = "default_max_fix_attempts")]
    pub max_fix_attempts: u32,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub simulator: SimulatorConfig,
}

fn default_max_fix_attempts() -> u32 {
    2
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            max_fix_attempts: default_max_fix_attempts(),
            generator: GeneratorConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// Settings for the LLM-backed workflow generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Settings for the simulated service backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Seed for probabilistic failure injection. Unseeded runs use entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Failure rules keyed by `"service.action"`.
    #[serde(default)]
    pub failures: BTreeMap<String, FailureRule>,
}

/// How a specific service action should fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRule {
    /// e.g. "rate_limit", "already_exists", "permission_denied".
    pub error_type: String,
    pub message: String,
    /// 1.0 always fails, 0.5 fails half the time.
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_probability() -> f64 {
    1.0
}
