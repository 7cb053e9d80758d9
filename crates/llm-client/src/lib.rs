//! Client side of the generative model service.

pub mod error;
pub mod gemini;
pub mod provider;

pub use error::{LlmError, LlmResult};
pub use gemini::GeminiClient;
pub use provider::{GenerationRequest, TextGenerator};

use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Configuration for the model service
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            temperature: env_or("LLM_TEMPERATURE", 0.2),
            max_output_tokens: env_or("LLM_MAX_OUTPUT_TOKENS", 1000),
            timeout: Duration::from_secs(env_or("LLM_TIMEOUT_SECS", 30)),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
