use async_trait::async_trait;
use serde_json::json;

use crate::adapter::{build_http_client, validate_request, ProviderAdapter, ProviderConfig};
use manifold_types::{Generation, GenerationRequest, ManifoldError, Provider, Result, Role};

// ---------------------------------------------------------------------------
// OpenAiAdapter
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_output_tokens: Option<u32>,
}

impl OpenAiAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ManifoldError::InvalidCredential {
                provider: Provider::OpenAi,
            });
        }
        Ok(Self {
            client: build_http_client(Provider::OpenAi, config.timeout)?,
            api_key: config.api_key,
            base_url: "https://api.openai.com".to_string(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    pub fn from_env() -> Result<Self> {
        let key = std::env::var("OPENAI_API_KEY").map_err(|_| ManifoldError::InvalidCredential {
            provider: Provider::OpenAi,
        })?;
        Self::new(ProviderConfig::new(key))
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        // 1. Message history maps 1:1; a flat prompt becomes one user message
        let messages: Vec<serde_json::Value> = if !request.messages.is_empty() {
            request
                .messages
                .iter()
                .map(|msg| {
                    let role = match msg.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                        Role::System => "system",
                    };
                    json!({ "role": role, "content": msg.content })
                })
                .collect()
        } else {
            vec![json!({ "role": "user", "content": request.prompt.as_deref().unwrap_or("") })]
        };

        // 2. Build body with the provider-native model id
        let mut body = json!({
            "model": native_model(&request.model),
            "messages": messages,
        });

        // 3. Optional output bound
        if let Some(max_tokens) = self.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<Generation> {
        let choices = body["choices"].as_array();
        let first = choices.and_then(|c| c.first()).ok_or(ManifoldError::NoContent {
            provider: Provider::OpenAi,
        })?;

        let text = first["message"]["content"].as_str().unwrap_or("").to_string();
        let tokens_used = body["usage"]["total_tokens"].as_u64().unwrap_or(0);

        Ok(Generation { text, tokens_used })
    }
}

// ---------------------------------------------------------------------------
// Model aliases (canonical id → provider-native id)
// ---------------------------------------------------------------------------

/// Maps known registry constants to their provider-native identifiers.
/// Unrecognized names pass through verbatim so new vendor releases work
/// without a code change.
fn native_model(model: &str) -> &str {
    match model {
        "o3-mini-2025-01-31k" => "o3-mini",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(status: reqwest::StatusCode, body: &str) -> ManifoldError {
    let status_u16 = status.as_u16();
    ManifoldError::ApiRequest {
        provider: Provider::OpenAi,
        status: status_u16,
        message: extract_error_message(body),
        retryable: matches!(status_u16, 429 | 500 | 502 | 503),
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// ProviderAdapter implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        validate_request(request)?;
        let body = self.build_request_body(request);

        tracing::debug!(model = %request.model, messages = request.messages.len(), "openai request");

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ManifoldError::ApiRequest {
                provider: Provider::OpenAi,
                status: 0,
                message: e.to_string(),
                retryable: true,
            })?;

        let status = resp.status();
        let response_body = resp.text().await.map_err(|e| ManifoldError::ApiRequest {
            provider: Provider::OpenAi,
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(map_error(status, &response_body));
        }

        let json: serde_json::Value =
            serde_json::from_str(&response_body).map_err(|e| ManifoldError::ApiRequest {
                provider: Provider::OpenAi,
                status: status.as_u16(),
                message: format!("failed to parse response JSON: {e}"),
                retryable: false,
            })?;

        self.parse_response(&json)
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn default_model(&self) -> &str {
        "gpt-4o"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
