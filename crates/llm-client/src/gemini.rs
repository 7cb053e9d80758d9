use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{LlmError, LlmResult};
use crate::provider::{GenerationRequest, TextGenerator};
use crate::{LlmConfig, API_KEY_ENV};

/// Header carrying the API key, so it never appears in request URLs
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini `generateContent` over HTTP.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(LlmError::MissingApiKey(API_KEY_ENV))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn build_request_body(request: &GenerationRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            }
        })
    }

    /// Concatenated text parts of the first candidate.
    pub fn parse_response(body: &Value) -> LlmResult<String> {
        let candidate = body["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| LlmError::InvalidResponse("no candidates in response".to_string()))?;

        let parts = candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("candidate has no content parts".to_string()))?;

        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if text.is_empty() {
            let reason = candidate["finishReason"].as_str().unwrap_or("unknown");
            return Err(LlmError::InvalidResponse(format!(
                "candidate has no text (finish reason: {})",
                reason
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<String> {
        let response = self
            .client
            .post(self.endpoint_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&Self::build_request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::RequestFailed(e.without_url())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Gemini returned {} for model {}", status, self.model);
            return Err(LlmError::ServiceUnavailable(format!("Status: {} {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::RequestFailed(e.without_url()))?;
        let text = Self::parse_response(&body)?;
        tracing::debug!("Gemini generated {} characters", text.len());
        Ok(text)
    }

    fn backend_name(&self) -> &'static str {
        "gemini"
    }
}
