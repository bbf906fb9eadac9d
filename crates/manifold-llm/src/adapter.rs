use async_trait::async_trait;
use std::time::Duration;

use manifold_types::{Generation, GenerationRequest, ManifoldError, Provider, Result};

// ---------------------------------------------------------------------------
// ProviderAdapter
// ---------------------------------------------------------------------------

/// Capability contract every provider backend satisfies: translate one
/// canonical request into a vendor-native call and normalize the reply.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
    fn provider(&self) -> Provider;
    fn default_model(&self) -> &str;
}

// ---------------------------------------------------------------------------
// DynAdapter
// ---------------------------------------------------------------------------

pub struct DynAdapter(Box<dyn ProviderAdapter>);

impl DynAdapter {
    pub fn new(adapter: impl ProviderAdapter + 'static) -> Self {
        Self(Box::new(adapter))
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.0.generate(request).await
    }

    pub fn provider(&self) -> Provider {
        self.0.provider()
    }

    pub fn default_model(&self) -> &str {
        self.0.default_model()
    }
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Per-provider adapter configuration: the API credential, an optional
/// output-token bound, and an optional request deadline.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub max_output_tokens: Option<u32>,
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            max_output_tokens: None,
            timeout: None,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ---------------------------------------------------------------------------
// Shared request validation
// ---------------------------------------------------------------------------

/// Validation every adapter performs before touching the network. Model
/// emptiness is checked before message emptiness.
pub(crate) fn validate_request(request: &GenerationRequest) -> Result<()> {
    if request.model.is_empty() {
        return Err(ManifoldError::InvalidModel);
    }
    let prompt_empty = request.prompt.as_deref().map_or(true, str::is_empty);
    if prompt_empty && request.messages.is_empty() {
        return Err(ManifoldError::EmptyMessages);
    }
    Ok(())
}

/// Builds the HTTP client an adapter holds for its lifetime. Fallible so a
/// bad configuration surfaces at construction instead of first use.
pub(crate) fn build_http_client(
    provider: Provider,
    timeout: Option<Duration>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| ManifoldError::ApiRequest {
        provider,
        status: 0,
        message: format!("failed to construct HTTP client: {e}"),
        retryable: false,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_types::Message;

    struct MockAdapter;

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
            validate_request(request)?;
            Ok(Generation {
                text: "Hello from mock".into(),
                tokens_used: 7,
            })
        }

        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }
    }

    #[tokio::test]
    async fn dyn_adapter_generate() {
        let adapter = DynAdapter::new(MockAdapter);
        let req = GenerationRequest::from_prompt("mock-model", "hi");
        let generation = adapter.generate(&req).await.unwrap();
        assert_eq!(generation.text, "Hello from mock");
        assert_eq!(generation.tokens_used, 7);
    }

    #[test]
    fn dyn_adapter_metadata() {
        let adapter = DynAdapter::new(MockAdapter);
        assert_eq!(adapter.provider(), Provider::OpenAi);
        assert_eq!(adapter.default_model(), "mock-model");
    }

    #[test]
    fn validate_rejects_empty_model() {
        let req = GenerationRequest::from_messages("", vec![Message::user("hi")]);
        let err = validate_request(&req).unwrap_err();
        assert!(matches!(err, ManifoldError::InvalidModel));
    }

    #[test]
    fn validate_empty_model_wins_over_empty_messages() {
        let req = GenerationRequest {
            model: String::new(),
            prompt: None,
            cache_enabled: false,
            messages: vec![],
        };
        let err = validate_request(&req).unwrap_err();
        assert!(matches!(err, ManifoldError::InvalidModel));
    }

    #[test]
    fn validate_rejects_missing_prompt_and_messages() {
        let req = GenerationRequest {
            model: "gpt-4o".into(),
            prompt: None,
            cache_enabled: false,
            messages: vec![],
        };
        let err = validate_request(&req).unwrap_err();
        assert!(matches!(err, ManifoldError::EmptyMessages));
    }

    #[test]
    fn validate_treats_blank_prompt_as_missing() {
        let req = GenerationRequest {
            model: "gpt-4o".into(),
            prompt: Some(String::new()),
            cache_enabled: false,
            messages: vec![],
        };
        let err = validate_request(&req).unwrap_err();
        assert!(matches!(err, ManifoldError::EmptyMessages));
    }

    #[test]
    fn validate_accepts_prompt_only() {
        let req = GenerationRequest::from_prompt("gpt-4o", "2+2?");
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn validate_accepts_messages_only() {
        let req = GenerationRequest::from_messages("gpt-4o", vec![Message::user("2+2?")]);
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn provider_config_builder() {
        let config = ProviderConfig::new("key")
            .with_max_output_tokens(2048)
            .with_timeout(Duration::from_secs(30));
        assert_eq!(config.api_key, "key");
        assert_eq!(config.max_output_tokens, Some(2048));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn build_http_client_with_timeout() {
        let client = build_http_client(Provider::OpenAi, Some(Duration::from_secs(5)));
        assert!(client.is_ok());
    }
}
