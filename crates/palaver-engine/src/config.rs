//! Configuration for the engine

use palaver_llm::{RetryPolicy, TokenBudget};
use serde::{Deserialize, Serialize};

/// Configuration for batch runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum LLM calls in flight at once
    pub max_concurrency: usize,

    /// Total LLM attempts per conversation, including the first
    pub max_attempts: u32,

    /// Base backoff delay between attempts (milliseconds, doubled each retry)
    pub base_delay_ms: u64,

    /// Estimated input-token budget per prompt
    pub max_input_tokens: usize,
}

/// Concurrency derived from the host, kept within a sane band
fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
        .clamp(4, 32)
}

impl EngineConfig {
    /// Retry policy built from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay_ms)
    }

    /// Token budget built from this configuration
    pub fn token_budget(&self) -> TokenBudget {
        TokenBudget::new(self.max_input_tokens)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.max_input_tokens == 0 {
            return Err("max_input_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            max_attempts: 3,
            base_delay_ms: 500,
            max_input_tokens: 8_192,
        }
    }
}

impl EngineConfig {
    /// Aggressive preset: wide fan-out, minimal retry patience
    pub fn aggressive() -> Self {
        Self {
            max_concurrency: 32,
            max_attempts: 2,
            base_delay_ms: 250,
            max_input_tokens: 4_096,
        }
    }

    /// Lenient preset: narrow fan-out, generous retries and budget
    pub fn lenient() -> Self {
        Self {
            max_concurrency: 4,
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_input_tokens: 16_384,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
