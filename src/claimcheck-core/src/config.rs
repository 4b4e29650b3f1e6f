//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::FactCheckError;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub context: ContextConfig,
    pub pipeline: PipelineConfig,
    pub model: ModelConfig,
}

/// Configuration for the web evidence search layer.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
    pub rate_limit_per_sec: u32,
    pub num_results: usize,
    pub timeout_secs: u64,
}

/// Configuration for the topical context index.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub max_context_size: usize,
    pub topic_threshold: f32,
    pub top_topics: usize,
}

/// Configuration for claim processing.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Assumed spacing of claims in the recording, used for speaker lookup.
    pub seconds_per_claim: f32,
}

/// Configuration for the chat model backing extraction and verdicts.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub extraction_max_tokens: u32,
    pub verdict_max_tokens: u32,
    pub temperature: f32,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FactCheckError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| FactCheckError::ConfigError(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| FactCheckError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, FactCheckError> {
        toml::from_str(content)
            .map_err(|e| FactCheckError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        search: SearchConfig {
            endpoint: "https://duckduckgo.com/html/".to_string(),
            cache_size: 100,
            cache_ttl_secs: 3600,
            rate_limit_per_sec: 10,
            num_results: 3,
            timeout_secs: 5,
        },
        context: ContextConfig {
            max_context_size: 5,
            topic_threshold: 0.8,
            top_topics: 3,
        },
        pipeline: PipelineConfig {
            seconds_per_claim: 10.0,
        },
        model: ModelConfig {
            model: "llama-3.1-70b-versatile".to_string(),
            extraction_max_tokens: 500,
            verdict_max_tokens: 300,
            temperature: 0.1,
        },
    }
}
