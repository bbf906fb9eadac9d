use async_trait::async_trait;
use serde_json::json;

use crate::adapter::{build_http_client, validate_request, ProviderAdapter, ProviderConfig};
use manifold_types::{Generation, GenerationRequest, ManifoldError, Provider, Result, Role};

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

// ---------------------------------------------------------------------------
// AnthropicAdapter
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    /// Required by the messages API on every call, so the bound is adapter
    /// configuration rather than a hardcoded constant.
    max_output_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ManifoldError::InvalidCredential {
                provider: Provider::Anthropic,
            });
        }
        Ok(Self {
            client: build_http_client(Provider::Anthropic, config.timeout)?,
            api_key: config.api_key,
            base_url: "https://api.anthropic.com".to_string(),
            max_output_tokens: config.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
        })
    }

    pub fn from_env() -> Result<Self> {
        let key =
            std::env::var("ANTHROPIC_API_KEY").map_err(|_| ManifoldError::InvalidCredential {
                provider: Provider::Anthropic,
            })?;
        Self::new(ProviderConfig::new(key))
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        // 1. The first system message becomes the dedicated system field;
        //    system messages never enter the regular message list.
        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        // 2. Remaining history maps 1:1; a flat prompt becomes one user message
        let messages: Vec<serde_json::Value> = if !request.messages.is_empty() {
            request
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|msg| {
                    let role = match msg.role {
                        Role::Assistant => "assistant",
                        _ => "user",
                    };
                    json!({ "role": role, "content": msg.content })
                })
                .collect()
        } else {
            vec![json!({ "role": "user", "content": request.prompt.as_deref().unwrap_or("") })]
        };

        // 3. Build body
        let mut body = json!({
            "model": native_model(&request.model),
            "max_tokens": self.max_output_tokens,
            "messages": messages,
        });

        if let Some(system) = system {
            body["system"] = json!(system);
        }

        body
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<Generation> {
        let content = body["content"].as_array().filter(|c| !c.is_empty()).ok_or(
            ManifoldError::NoContent {
                provider: Provider::Anthropic,
            },
        )?;

        let text: String = content
            .iter()
            .filter(|block| block["type"] == "text")
            .filter_map(|block| block["text"].as_str())
            .collect();

        // Token count is input and output summed
        let usage = &body["usage"];
        let input_tokens = usage["input_tokens"].as_u64().unwrap_or(0);
        let output_tokens = usage["output_tokens"].as_u64().unwrap_or(0);

        Ok(Generation {
            text,
            tokens_used: input_tokens + output_tokens,
        })
    }
}

// ---------------------------------------------------------------------------
// Model aliases (canonical id → provider-native id)
// ---------------------------------------------------------------------------

fn native_model(model: &str) -> &str {
    match model {
        "claude-3-opus" => "claude-3-opus-latest",
        "claude-3.7-sonnet" => "claude-3-7-sonnet-latest",
        "claude-3-haiku" => "claude-3-5-haiku-latest",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(status: reqwest::StatusCode, body: &str) -> ManifoldError {
    let status_u16 = status.as_u16();
    ManifoldError::ApiRequest {
        provider: Provider::Anthropic,
        status: status_u16,
        message: extract_error_message(body),
        retryable: matches!(status_u16, 429 | 500 | 529),
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
impl ProviderAdapter for AnthropicAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        validate_request(request)?;
        let body = self.build_request_body(request);

        tracing::debug!(model = %request.model, messages = request.messages.len(), "anthropic request");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ManifoldError::ApiRequest {
                provider: Provider::Anthropic,
                status: 0,
                message: e.to_string(),
                retryable: true,
            })?;

        let status = resp.status();
        let response_body = resp.text().await.map_err(|e| ManifoldError::ApiRequest {
            provider: Provider::Anthropic,
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(map_error(status, &response_body));
        }

        let json: serde_json::Value =
            serde_json::from_str(&response_body).map_err(|e| ManifoldError::ApiRequest {
                provider: Provider::Anthropic,
                status: status.as_u16(),
                message: format!("failed to parse response JSON: {e}"),
                retryable: false,
            })?;

        self.parse_response(&json)
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn default_model(&self) -> &str {
        "claude-3.7-sonnet"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_types::Message;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(ProviderConfig::new("test-key")).unwrap()
    }

    #[test]
    fn new_rejects_empty_key() {
        let err = AnthropicAdapter::new(ProviderConfig::new("")).unwrap_err();
        assert!(
            matches!(err, ManifoldError::InvalidCredential { provider } if provider == Provider::Anthropic)
        );
    }

    #[test]
    fn system_message_moves_to_system_field() {
        let req = GenerationRequest::from_messages(
            "claude-3-haiku",
            vec![Message::system("Be terse"), Message::user("Hi")],
        );
        let body = adapter().build_request_body(&req);

        assert_eq!(body["system"], "Be terse");

        // Only the user message remains in the regular list
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hi");
    }

    #[test]
    fn first_system_message_wins() {
        let req = GenerationRequest::from_messages(
            "claude-3-haiku",
            vec![
                Message::user("Hi"),
                Message::system("first instruction"),
                Message::system("second instruction"),
            ],
        );
        let body = adapter().build_request_body(&req);
        assert_eq!(body["system"], "first instruction");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn no_system_field_without_system_messages() {
        let req = GenerationRequest::from_messages("claude-3-haiku", vec![Message::user("Hi")]);
        let body = adapter().build_request_body(&req);
        assert!(body.get("system").is_none() || body["system"].is_null());
    }

    #[test]
    fn prompt_becomes_single_user_message() {
        let req = GenerationRequest::from_prompt("claude-3-haiku", "2+2?");
        let body = adapter().build_request_body(&req);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "2+2?");
    }

    #[test]
    fn max_tokens_comes_from_configuration() {
        let req = GenerationRequest::from_prompt("claude-3-haiku", "hi");

        let body = adapter().build_request_body(&req);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_OUTPUT_TOKENS);

        let bounded =
            AnthropicAdapter::new(ProviderConfig::new("test-key").with_max_output_tokens(1024))
                .unwrap();
        let body = bounded.build_request_body(&req);
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn known_aliases_map_to_native_ids() {
        assert_eq!(native_model("claude-3-opus"), "claude-3-opus-latest");
        assert_eq!(native_model("claude-3.7-sonnet"), "claude-3-7-sonnet-latest");
        assert_eq!(native_model("claude-3-haiku"), "claude-3-5-haiku-latest");
        assert_eq!(native_model("claude-next-99"), "claude-next-99");
    }

    #[test]
    fn parse_response_sums_input_and_output_tokens() {
        let body = json!({
            "id": "msg_123",
            "content": [ { "type": "text", "text": "4" } ],
            "usage": { "input_tokens": 11, "output_tokens": 3 }
        });

        let generation = adapter().parse_response(&body).unwrap();
        assert_eq!(generation.text, "4");
        assert_eq!(generation.tokens_used, 14);
    }

    #[test]
    fn parse_response_joins_text_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "Hello " },
                { "type": "text", "text": "world" }
            ],
            "usage": { "input_tokens": 1, "output_tokens": 2 }
        });
        let generation = adapter().parse_response(&body).unwrap();
        assert_eq!(generation.text, "Hello world");
    }

    #[test]
    fn parse_response_empty_content_is_no_content() {
        let body = json!({ "id": "msg_456", "content": [] });
        let err = adapter().parse_response(&body).unwrap_err();
        assert!(
            matches!(err, ManifoldError::NoContent { provider } if provider == Provider::Anthropic)
        );
    }

    #[tokio::test]
    async fn generate_with_empty_model_fails_before_network() {
        let req = GenerationRequest::from_messages("", vec![Message::user("hi")]);
        let err = adapter().generate(&req).await.unwrap_err();
        assert!(matches!(err, ManifoldError::InvalidModel));
    }

    #[tokio::test]
    async fn generate_without_prompt_or_messages_fails_before_network() {
        let req = GenerationRequest::from_messages("claude-3-haiku", vec![]);
        let err = adapter().generate(&req).await.unwrap_err();
        assert!(matches!(err, ManifoldError::EmptyMessages));
    }

    #[test]
    fn error_mapping_529_overloaded_is_retryable() {
        let status = reqwest::StatusCode::from_u16(529).unwrap();
        let err = map_error(status, r#"{"error": {"message": "overloaded"}}"#);
        match &err {
            ManifoldError::ApiRequest { status, retryable, .. } => {
                assert_eq!(*status, 529);
                assert!(*retryable);
            }
            _ => panic!("expected ApiRequest"),
        }
    }

    #[test]
    fn error_mapping_401_is_not_retryable() {
        let err = map_error(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "invalid api key"}}"#,
        );
        assert!(!err.is_retryable());
    }
}
