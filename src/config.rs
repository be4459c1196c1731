use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a single evaluation run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Display title for the run
    pub title: String,
    /// Path to the dataset file (JSON array of records)
    pub data: String,
    /// Built-in scorer names to run on every row
    pub scorers: Vec<String>,
    /// Prediction fan-out width
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Optional LLM predictor; when absent, rows must supply their own outputs
    #[serde(default)]
    pub predict: Option<PredictorConfig>,
}

/// Configuration for the OpenAI-compatible predictor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictorConfig {
    /// API endpoint
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    pub env_var_api_key: String,
    /// Model to use for generating responses
    pub model: String,
    /// Temperature for response generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Maximum tokens for response generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Rate limit for API requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,
    /// System prompt sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_concurrency() -> usize {
    4
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_rate_limit() -> f64 {
    10.0
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

/// Root configuration containing the list of runs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// List of evaluation runs
    pub runs: Vec<RunConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}
