use async_trait::async_trait;
use serde_json::json;

use crate::adapter::{build_http_client, validate_request, ProviderAdapter, ProviderConfig};
use manifold_types::{Generation, GenerationRequest, ManifoldError, Provider, Result, Role};

// ---------------------------------------------------------------------------
// GeminiAdapter
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_output_tokens: Option<u32>,
}

impl GeminiAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ManifoldError::InvalidCredential {
                provider: Provider::Gemini,
            });
        }
        Ok(Self {
            client: build_http_client(Provider::Gemini, config.timeout)?,
            api_key: config.api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    pub fn from_env() -> Result<Self> {
        let key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| ManifoldError::InvalidCredential {
                provider: Provider::Gemini,
            })?;
        Self::new(ProviderConfig::new(key))
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Builds the content list: the translated history as chat context plus
    /// the outbound turn appended as a final user content. Returns
    /// `EmptyMessages` when no outbound turn can be determined.
    fn build_request_body(&self, request: &GenerationRequest) -> Result<serde_json::Value> {
        // 1. Translate the history. There is no separate system channel, so
        //    system messages are demoted to user role.
        let mut contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "model",
                    Role::User | Role::System => "user",
                };
                json!({ "role": role, "parts": [{ "text": msg.content }] })
            })
            .collect();

        // 2. Pick the outbound turn: the flat prompt, or the most recent
        //    user message scanning the history from the end.
        let outbound = match request.prompt.as_deref().filter(|p| !p.is_empty()) {
            Some(prompt) => prompt,
            None => request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.as_str())
                .ok_or(ManifoldError::EmptyMessages)?,
        };
        contents.push(json!({ "role": "user", "parts": [{ "text": outbound }] }));

        // 3. Build body
        let mut body = json!({ "contents": contents });

        if let Some(max_tokens) = self.max_output_tokens {
            body["generationConfig"] = json!({ "maxOutputTokens": max_tokens });
        }

        Ok(body)
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<Generation> {
        let no_content = || ManifoldError::NoContent {
            provider: Provider::Gemini,
        };

        let candidate = body["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(no_content)?;

        let parts = candidate["content"]["parts"]
            .as_array()
            .filter(|p| !p.is_empty())
            .ok_or_else(no_content)?;

        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();

        let usage = &body["usageMetadata"];
        let tokens_used = usage["totalTokenCount"].as_u64().unwrap_or_else(|| {
            usage["promptTokenCount"].as_u64().unwrap_or(0)
                + usage["candidatesTokenCount"].as_u64().unwrap_or(0)
        });

        Ok(Generation { text, tokens_used })
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(status: reqwest::StatusCode, body: &str) -> ManifoldError {
    let status_u16 = status.as_u16();
    ManifoldError::ApiRequest {
        provider: Provider::Gemini,
        status: status_u16,
        message: extract_error_message(body),
        retryable: matches!(status_u16, 429 | 500 | 503),
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
impl ProviderAdapter for GeminiAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        validate_request(request)?;
        let body = self.build_request_body(request)?;

        tracing::debug!(model = %request.model, messages = request.messages.len(), "gemini request");

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ManifoldError::ApiRequest {
                provider: Provider::Gemini,
                status: 0,
                message: e.to_string(),
                retryable: true,
            })?;

        let status = resp.status();
        let response_body = resp.text().await.map_err(|e| ManifoldError::ApiRequest {
            provider: Provider::Gemini,
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(map_error(status, &response_body));
        }

        let json: serde_json::Value =
            serde_json::from_str(&response_body).map_err(|e| ManifoldError::ApiRequest {
                provider: Provider::Gemini,
                status: status.as_u16(),
                message: format!("failed to parse response JSON: {e}"),
                retryable: false,
            })?;

        self.parse_response(&json)
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn default_model(&self) -> &str {
        "gemini-2.0-flash"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
