//! Shared value types and errors for the Manifold text-generation client.
//!
//! This crate provides the canonical vocabulary used across the other
//! Manifold crates:
//! - `Provider`, `Role`, `Message` — the conversation model
//! - `GenerationRequest` / `Generation` — the unified call contract
//! - `ManifoldError` — unified error taxonomy
//! - `models` — pre-registered model identifier constants

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A supported vendor backend. Closed set: adding a provider means adding an
/// adapter and a classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One turn of a conversation. Ordering matters; system messages may appear
/// anywhere and are extracted or demoted per adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// Parameters for one text-generation call.
///
/// At least one of `prompt` or a non-empty `messages` history must be set;
/// adapters reject requests that carry neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier. Opaque string — known ids are listed in [`models`],
    /// but arbitrary strings are accepted and classified at dispatch time.
    pub model: String,
    /// Flat prompt text, used when no message history is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Accepted for wire compatibility; currently ignored by every adapter.
    #[serde(default)]
    pub cache_enabled: bool,
    /// Conversation history, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl GenerationRequest {
    /// Request with a single flat prompt and no history.
    pub fn from_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: Some(prompt.into()),
            cache_enabled: false,
            messages: Vec::new(),
        }
    }

    /// Request carrying a message history.
    pub fn from_messages(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            prompt: None,
            cache_enabled: false,
            messages,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Result of a successful generation call. Failures are reported through
/// [`ManifoldError`]; there are no partial results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u64,
}

// ---------------------------------------------------------------------------
// ManifoldError
// ---------------------------------------------------------------------------

/// Unified error type for all Manifold subsystems.
#[derive(Debug, thiserror::Error)]
pub enum ManifoldError {
    #[error("invalid model: model identifier is empty")]
    InvalidModel,

    #[error("empty messages: request carries no prompt and no messages")]
    EmptyMessages,

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid API key for provider {provider}")]
    InvalidCredential { provider: Provider },

    #[error("{provider} request failed (HTTP {status}): {message}")]
    ApiRequest {
        provider: Provider,
        /// HTTP status of the failed call; 0 for pure transport errors.
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("{provider} returned no generated content")]
    NoContent { provider: Provider },
}

impl ManifoldError {
    /// Returns `true` if the error is transient and the call may succeed if
    /// the caller repeats it. The library itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ManifoldError::ApiRequest { retryable: true, .. })
    }
}

/// A convenience alias for `Result<T, ManifoldError>`.
pub type Result<T> = std::result::Result<T, ManifoldError>;

// ---------------------------------------------------------------------------
// models — pre-registered model identifiers
// ---------------------------------------------------------------------------

/// Known model identifier constants. The registry classifies arbitrary
/// strings, so this list is a convenience, not an allowlist.
pub mod models {
    // OpenAI
    pub const GPT_4O: &str = "gpt-4o";
    pub const GPT_4: &str = "gpt-4";
    pub const GPT_35_TURBO: &str = "gpt-3.5-turbo";
    pub const O3_MINI: &str = "o3-mini-2025-01-31k";
    pub const O4_MINI: &str = "o4-mini-2025-04-16";
    pub const GPT_41_NANO: &str = "gpt-4.1-nano-2025-04-14";
    pub const O3: &str = "o3-2025-04-16";

    // Anthropic
    pub const CLAUDE_3_OPUS: &str = "claude-3-opus";
    pub const CLAUDE_37_SONNET: &str = "claude-3.7-sonnet";
    pub const CLAUDE_3_HAIKU: &str = "claude-3-haiku";

    // Gemini
    pub const GEMINI_20_FLASH: &str = "gemini-2.0-flash";
    pub const GEMINI_20_PRO: &str = "gemini-2.0-pro";
    pub const GEMINI_25_FLASH_PREVIEW: &str = "gemini-2.5-flash-preview-04-17";
    pub const GEMINI_25_PRO_PREVIEW: &str = "gemini-2.5-pro-preview-03-25";
    pub const GEMINI_25_PRO: &str = "gemini-2.5-pro-exp-03-25";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
