use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmResult;

/// One text-generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Backend-agnostic interface to a generative model.
///
/// Implemented by the Gemini HTTP client; tests substitute scripted fakes.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generated text for `request`. Output is not validated here.
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<String>;

    fn backend_name(&self) -> &'static str;
}
