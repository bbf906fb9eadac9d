use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use manifold_types::Provider;

// ---------------------------------------------------------------------------
// Pattern classification
// ---------------------------------------------------------------------------

fn openai_short_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Digit-prefixed short codes like "o3-", "o4-".
    RE.get_or_init(|| Regex::new(r"^o\d+-").expect("static pattern compiles"))
}

/// Classifies a model identifier into a provider by naming pattern.
///
/// `gpt-` prefixed names and `o<digit>-` short codes belong to OpenAI,
/// `claude-` to Anthropic, `gemini-` to Gemini. Matching is case-sensitive.
/// Returns `None` for names no rule recognizes — unresolved, not an error.
pub fn infer_provider(model: &str) -> Option<Provider> {
    if model.starts_with("gpt-") || openai_short_code().is_match(model) {
        return Some(Provider::OpenAi);
    }
    if model.starts_with("claude-") {
        return Some(Provider::Anthropic);
    }
    if model.starts_with("gemini-") {
        return Some(Provider::Gemini);
    }
    None
}

// ---------------------------------------------------------------------------
// ModelRegistry
// ---------------------------------------------------------------------------

/// Maps model identifiers to providers: an explicit override table merged
/// with the naming-pattern rule. Overrides always win, which lets callers
/// route new or oddly-named models without a code change.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    overrides: RwLock<HashMap<String, Provider>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites an override entry. Registration is cheap and
    /// performs no validation; an override for a provider without a
    /// configured adapter fails at dispatch time instead.
    pub fn register(&self, model: impl Into<String>, provider: Provider) {
        self.overrides
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(model.into(), provider);
    }

    /// Resolves a model identifier: override table first, then the naming
    /// pattern. `None` means unresolved; the caller decides whether to fail.
    pub fn resolve(&self, model: &str) -> Option<Provider> {
        let overridden = self
            .overrides
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(model)
            .copied();
        overridden.or_else(|| infer_provider(model))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
