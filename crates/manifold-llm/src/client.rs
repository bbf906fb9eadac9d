use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::adapter::{DynAdapter, ProviderAdapter, ProviderConfig};
use crate::registry::ModelRegistry;
use crate::{AnthropicAdapter, GeminiAdapter, OpenAiAdapter};
use manifold_types::{Generation, GenerationRequest, ManifoldError, Provider, Result};

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Observational hooks around every dispatched call. The generation itself
/// flows back to the caller unchanged by the built-in middleware.
pub trait Middleware: Send + Sync {
    fn before(&self, _request: &mut GenerationRequest) {}
    fn after(&self, _request: &GenerationRequest, _generation: &mut Generation) {}
}

// ---------------------------------------------------------------------------
// Built-in middleware: LoggingMiddleware
// ---------------------------------------------------------------------------

pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn before(&self, request: &mut GenerationRequest) {
        tracing::info!(
            model = %request.model,
            messages = request.messages.len(),
            "generation request"
        );
    }

    fn after(&self, request: &GenerationRequest, generation: &mut Generation) {
        tracing::info!(
            model = %request.model,
            tokens_used = generation.tokens_used,
            "generation response"
        );
    }
}

// ---------------------------------------------------------------------------
// Built-in middleware: UsageTrackingMiddleware
// ---------------------------------------------------------------------------

/// Accumulates token usage across calls; share the handle to read totals.
#[derive(Clone, Default)]
pub struct UsageTrackingMiddleware {
    total_tokens: Arc<AtomicU64>,
}

impl UsageTrackingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_tokens_used(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }
}

impl Middleware for UsageTrackingMiddleware {
    fn after(&self, _request: &GenerationRequest, generation: &mut Generation) {
        self.total_tokens
            .fetch_add(generation.tokens_used, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// UnifiedClient
// ---------------------------------------------------------------------------

/// Facade over the configured provider adapters: resolves each request's
/// model to a provider and dispatches to the matching adapter.
pub struct UnifiedClient {
    adapters: HashMap<Provider, DynAdapter>,
    registry: ModelRegistry,
    middleware: Vec<Box<dyn Middleware>>,
}

impl std::fmt::Debug for UnifiedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedClient")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("middleware_count", &self.middleware.len())
            .finish()
    }
}

impl UnifiedClient {
    /// Constructs one adapter per configured provider. Any single adapter
    /// failure aborts the whole construction; there is no partial client.
    pub fn new(configs: HashMap<Provider, ProviderConfig>) -> Result<Self> {
        let mut adapters = HashMap::new();
        for (provider, config) in configs {
            let adapter = match provider {
                Provider::OpenAi => DynAdapter::new(OpenAiAdapter::new(config)?),
                Provider::Anthropic => DynAdapter::new(AnthropicAdapter::new(config)?),
                Provider::Gemini => DynAdapter::new(GeminiAdapter::new(config)?),
            };
            adapters.insert(provider, adapter);
        }
        Ok(Self {
            adapters,
            registry: ModelRegistry::new(),
            middleware: Vec::new(),
        })
    }

    /// Create from environment variables (detect available API keys).
    pub fn from_env() -> Result<Self> {
        let mut configs = HashMap::new();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            configs.insert(Provider::OpenAi, ProviderConfig::new(key));
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            configs.insert(Provider::Anthropic, ProviderConfig::new(key));
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY").or_else(|_| std::env::var("GEMINI_API_KEY"))
        {
            configs.insert(Provider::Gemini, ProviderConfig::new(key));
        }

        if configs.is_empty() {
            return Err(ManifoldError::UnsupportedProvider(
                "no provider API keys found in environment".into(),
            ));
        }

        Self::new(configs)
    }

    pub fn with_middleware(mut self, m: impl Middleware + 'static) -> Self {
        self.middleware.push(Box::new(m));
        self
    }

    /// Inserts or replaces the adapter for a provider. Useful for custom
    /// endpoints and for mounting stub transports in tests.
    pub fn register_adapter(&mut self, adapter: impl ProviderAdapter + 'static) {
        let provider = adapter.provider();
        self.adapters.insert(provider, DynAdapter::new(adapter));
    }

    /// Registers an explicit model → provider override. Cheap and
    /// side-effect-free: nothing checks that the provider has a configured
    /// adapter — dispatch fails at call time instead.
    pub fn register_custom_model(&self, model: impl Into<String>, provider: Provider) {
        self.registry.register(model, provider);
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Routes the request to the adapter for its resolved provider and
    /// returns that adapter's result unchanged.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let provider = self.registry.resolve(&request.model).ok_or_else(|| {
            ManifoldError::UnsupportedProvider(format!(
                "model '{}' does not match any known provider",
                request.model
            ))
        })?;

        let adapter = self.adapters.get(&provider).ok_or_else(|| {
            ManifoldError::UnsupportedProvider(format!(
                "no adapter configured for provider '{provider}'"
            ))
        })?;

        let mut req = request.clone();
        for m in &self.middleware {
            m.before(&mut req);
        }

        let mut generation = adapter.generate(&req).await?;

        for m in &self.middleware {
            m.after(&req, &mut generation);
        }

        Ok(generation)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
