//! # PromptCrew Models
//!
//! Centralized LLM configuration types for the PromptCrew system.
//! Skills and the swarm coordinator both depend on these; the HTTP gateway in
//! `llm/` turns a [`ModelConfig`] into a concrete provider call.

use serde::{Deserialize, Serialize};

/// Supported LLM providers
///
/// Each provider reads its API key from an environment variable:
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::Anthropic,
            LlmProvider::OpenAI,
            LlmProvider::Gemini,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    /// Stable identifier used in config files and the API
    pub fn id(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::OpenAI => "openai",
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::Grok => "grok",
            LlmProvider::DeepSeek => "deepseek",
        }
    }

    /// Parse a provider from its identifier (case-insensitive)
    pub fn from_id(id: &str) -> Option<LlmProvider> {
        LlmProvider::all()
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variable holding the API key
    pub fn env_var(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Model used when neither a per-agent nor a global model is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::Gemini => "gemini-2.0-flash-exp",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Base URL of the provider's HTTP API
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "https://api.anthropic.com/v1",
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            LlmProvider::OpenRouter => "https://openrouter.ai/api/v1",
            LlmProvider::Grok => "https://api.x.ai/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Whether the provider speaks the OpenAI chat-completions wire format
    pub fn is_openai_compatible(&self) -> bool {
        !matches!(self, LlmProvider::Anthropic)
    }
}

/// Configuration for LLM model selection
///
/// Used throughout PromptCrew to configure which LLM provider and model
/// a stage runs against. Supports per-agent configuration overrides via
/// [`crate::swarm::CoordinatorConfig`].
///
/// ## Example
/// ```rust,ignore
/// use promptcrew_core::models::{ModelConfig, LlmProvider};
///
/// // Default Anthropic
/// let config = ModelConfig::default();
///
/// // Specific provider and model
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: LlmProvider::Anthropic.default_model().to_string(),
            base_url: None,
        }
    }
}

impl ModelConfig {
    /// Create a new model config with default provider (Anthropic)
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: model.into(),
            base_url: None,
        }
    }

    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// The endpoint root this config talks to
    pub fn endpoint(&self) -> String {
        let base = match (&self.base_url, self.provider.supports_base_url()) {
            (Some(url), true) => url.as_str(),
            _ => self.provider.default_base_url(),
        };
        base.trim_end_matches('/').to_string()
    }
}

// ============================================================================
// Model Catalog
// ============================================================================

/// Identifier meaning "let the crew pick a model"
pub const RECOMMENDED_MODEL: &str = "Recommended";

/// Known target models, grouped the way the prompt generator form offers them.
///
/// These are the models a generated prompt is *written for*, not the models
/// that run the crew.
pub const MODEL_CATALOG: &[(&str, &[&str])] = &[
    ("Recommended", &[RECOMMENDED_MODEL]),
    (
        "Claude",
        &[
            "claude-3-5-sonnet-202410",
            "claude-3-opus",
            "claude-3.5-haiku",
            "claude-3.5-sonnet",
        ],
    ),
    (
        "GPT",
        &[
            "gpt-3.5-turbo",
            "gpt-4",
            "gpt-4-turbo-2024-04-09",
            "gpt-4o",
            "gpt-4o-mini",
        ],
    ),
    (
        "Other",
        &["cursor-small", "gemini-exp-1206", "o1-mini", "o1-preview"],
    ),
];

/// Normalize an ordered model preference list.
///
/// Blank entries and duplicates are dropped (first occurrence wins), known
/// models are rewritten to their catalog spelling, unknown identifiers are
/// kept as given. An empty result becomes `["Recommended"]`.
pub fn normalize_model_preference(preference: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for raw in preference {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let canonical = MODEL_CATALOG
            .iter()
            .flat_map(|(_, models)| models.iter())
            .find(|m| m.eq_ignore_ascii_case(trimmed))
            .map(|m| m.to_string())
            .unwrap_or_else(|| trimmed.to_string());
        if !normalized.iter().any(|m| m.eq_ignore_ascii_case(&canonical)) {
            normalized.push(canonical);
        }
    }
    if normalized.is_empty() {
        normalized.push(RECOMMENDED_MODEL.to_string());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::Anthropic);
        assert!(config.model.contains("claude"));
    }

    #[test]
    fn test_provider_display_names() {
        assert_eq!(LlmProvider::Anthropic.display_name(), "Anthropic");
        assert_eq!(LlmProvider::OpenAI.display_name(), "OpenAI");
    }

    #[test]
    fn test_base_url_support() {
        assert!(LlmProvider::OpenAI.supports_base_url());
        assert!(!LlmProvider::Anthropic.supports_base_url());
    }

    #[test]
    fn test_endpoint_ignores_override_for_fixed_providers() {
        let anthropic = ModelConfig {
            base_url: Some("http://localhost:9999".to_string()),
            ..ModelConfig::default()
        };
        assert_eq!(anthropic.endpoint(), "https://api.anthropic.com/v1");

        let openai = ModelConfig {
            base_url: Some("http://localhost:9999/v1/".to_string()),
            ..ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o")
        };
        assert_eq!(openai.endpoint(), "http://localhost:9999/v1");
    }

    #[test]
    fn test_provider_from_id() {
        assert_eq!(LlmProvider::from_id("OpenAI"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_id("deepseek"), Some(LlmProvider::DeepSeek));
        assert_eq!(LlmProvider::from_id("mystery"), None);
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("openai"));
        assert!(json.contains("gpt-4o"));
    }

    #[test]
    fn test_normalize_model_preference() {
        let prefs = vec![
            " GPT-4o ".to_string(),
            "".to_string(),
            "gpt-4o".to_string(),
            "my-local-model".to_string(),
        ];
        assert_eq!(
            normalize_model_preference(&prefs),
            vec!["gpt-4o".to_string(), "my-local-model".to_string()]
        );
        assert_eq!(normalize_model_preference(&[]), vec!["Recommended"]);
    }
}
