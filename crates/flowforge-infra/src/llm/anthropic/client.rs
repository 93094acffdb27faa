//! AnthropicGenerator: [`WorkflowGenerator`] over the Anthropic Messages API.
//!
//! Each attempt is one non-streaming `/v1/messages` call. The response text is
//! forwarded as a `text` passthrough event, token usage as a `usage` event,
//! and the extracted JSON (or the raw text when there is none) as the
//! candidate workflow.
//!
//! The API key is held as a [`SecretString`] and only exposed when building
//! request headers.

use std::time::Duration;

use flowforge_core::generator::{
    GenerationChunk, GenerationError, GenerationRequest, GenerationStream, WorkflowGenerator,
};
use flowforge_core::workflow::prompt::{SYSTEM_PROMPT, build_user_prompt};
use flowforge_types::config::GeneratorConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use super::types::{AnthropicErrorResponse, AnthropicMessage, AnthropicRequest, AnthropicResponse};
use crate::llm::extract_workflow_json;

/// Workflow generator backed by Claude.
///
/// Does not derive Debug so the key cannot end up in logs.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    config: GeneratorConfig,
}

impl AnthropicGenerator {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(api_key: SecretString, config: GeneratorConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| GenerationError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn to_anthropic_request(&self, request: &GenerationRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: build_user_prompt(request),
            }],
            system: Some(SYSTEM_PROMPT.to_string()),
            // Retries ask for the same structure with targeted fixes.
            temperature: Some(if request.attempt > 1 { 0.2 } else { 0.4 }),
        }
    }
}

/// Map a non-2xx status and body to a [`GenerationError`].
fn status_error(status: reqwest::StatusCode, body: &str) -> GenerationError {
    let detail = serde_json::from_str::<AnthropicErrorResponse>(body)
        .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
        .unwrap_or_else(|_| body.to_string());
    match status.as_u16() {
        401 | 403 => GenerationError::Authentication(detail),
        429 => GenerationError::Request(format!("rate limited: {detail}")),
        _ => GenerationError::Request(format!("HTTP {status}: {detail}")),
    }
}

/// Turn a successful response into the chunks handed to the pipeline.
///
/// Replies without any JSON are still forwarded as workflow text, so the
/// pipeline rejects them during validation and asks for a correction.
fn response_chunks(parsed: AnthropicResponse) -> Vec<GenerationChunk> {
    let text = parsed.text();
    let candidate = match extract_workflow_json(&text) {
        Some(json) => json,
        None => {
            tracing::debug!(response_id = %parsed.id, "response contained no workflow JSON");
            text.clone()
        }
    };
    vec![
        GenerationChunk::Passthrough {
            kind: "text".to_string(),
            payload: json!({ "content": text }),
        },
        GenerationChunk::Passthrough {
            kind: "usage".to_string(),
            payload: json!({
                "model": parsed.model,
                "input_tokens": parsed.usage.input_tokens,
                "output_tokens": parsed.usage.output_tokens,
                "stop_reason": parsed.stop_reason,
            }),
        },
        GenerationChunk::Workflow(candidate),
    ]
}

impl WorkflowGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn generate(&self, request: GenerationRequest) -> GenerationStream {
        let body = self.to_anthropic_request(&request);
        let attempt = request.attempt;
        let builder = self
            .client
            .post(self.url())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        Box::pin(async_stream::try_stream! {
            tracing::debug!(attempt, model = %body.model, "requesting workflow from anthropic");
            let response = builder
                .send()
                .await
                .map_err(|e| GenerationError::Request(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            let parsed: AnthropicResponse = if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                Err(status_error(status, &error_body))?
            } else {
                response.json().await.map_err(|e| {
                    GenerationError::InvalidResponse(format!("failed to parse response: {e}"))
                })?
            };

            for chunk in response_chunks(parsed) {
                yield chunk;
            }
        })
    }
}
