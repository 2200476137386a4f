//! Configuration Types
//!
//! All configuration structures with sensible defaults. Loaded once at
//! process start and read-only afterward. API keys are never serialized back
//! out and are redacted in debug output; the provider adapters convert them
//! to `SecretString` for runtime protection.

use serde::{Deserialize, Serialize};

use crate::ai::provider::ProviderKind;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// AI provider settings
    pub ai: AiConfig,

    /// Log collection and classification settings
    pub logs: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            ai: AiConfig::default(),
            logs: LogConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `SosError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.ai.timeout_secs == 0 {
            return Err(crate::types::SosError::Config(
                "ai.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(crate::types::SosError::Config(format!(
                "ai.temperature must be between 0.0 and 2.0, got {}",
                self.ai.temperature
            )));
        }

        if self.ai.provider_order.is_empty() {
            return Err(crate::types::SosError::Config(
                "ai.provider_order must name at least one provider".to_string(),
            ));
        }

        if self.logs.category_cap == 0 {
            return Err(crate::types::SosError::Config(
                "logs.category_cap must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// AI Configuration
// =============================================================================

/// Response language preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Cs,
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "cs" | "czech" => Ok(Self::Cs),
            _ => Err(format!("Invalid language '{}'. Valid values: en, cs", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Ordered fallback preference. An explicit `--provider` flag moves that
    /// provider to the front; candidates without credentials are skipped.
    pub provider_order: Vec<ProviderKind>,

    /// Response language for recommendations
    pub language: Language,

    /// Per-request timeout in seconds, enforced by every adapter
    pub timeout_secs: u64,

    /// Temperature for LLM generation
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: usize,

    pub openai: ProviderSettings,
    pub gemini: ProviderSettings,
    pub mercury: ProviderSettings,
    pub claude_agent: AgentSettings,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider_order: ProviderKind::DEFAULT_ORDER.to_vec(),
            language: Language::En,
            timeout_secs: 60,
            temperature: 0.7,
            max_tokens: 4096,
            openai: ProviderSettings::with_model("gpt-4o"),
            gemini: ProviderSettings::with_model("gemini-2.0-flash-exp"),
            mercury: ProviderSettings::with_model("mercury-coder"),
            claude_agent: AgentSettings::default(),
        }
    }
}

impl AiConfig {
    /// Settings block for a given provider kind.
    pub fn settings(&self, kind: ProviderKind) -> Option<&ProviderSettings> {
        match kind {
            ProviderKind::Openai => Some(&self.openai),
            ProviderKind::Gemini => Some(&self.gemini),
            ProviderKind::Mercury => Some(&self.mercury),
            ProviderKind::ClaudeAgent => None,
        }
    }
}

/// Per-provider settings for the API-key backed adapters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Model name (provider-specific)
    pub model: String,

    /// API key. Prefer the provider's environment variable; this field exists
    /// for completeness and is never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL override (for custom endpoints)
    pub api_base: Option<String>,
}

impl ProviderSettings {
    fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            api_key: None,
            api_base: None,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::with_model("")
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Settings for the OAuth-backed local agent provider. No API key: it rides
/// on the Claude CLI session behind the local AgentAPI server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// AgentAPI server URL
    pub api_url: String,

    /// Seconds between conversation polls
    pub poll_interval_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3284".to_string(),
            poll_interval_secs: 2,
        }
    }
}

// =============================================================================
// Log Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Journal window, journalctl-style (e.g. "1h", "24h", "7d")
    pub time_range: String,

    /// Maximum deduplicated findings kept per category
    pub category_cap: usize,

    /// Optional keyword overrides; categories left unset keep the built-in
    /// defaults.
    pub keywords: KeywordOverrides,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            time_range: "24h".to_string(),
            category_cap: 20,
            keywords: KeywordOverrides::default(),
        }
    }
}

/// Per-category keyword replacement lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordOverrides {
    pub hardware: Option<Vec<String>>,
    pub driver: Option<Vec<String>>,
    pub gui: Option<Vec<String>>,
    pub security: Option<Vec<String>>,
    pub service: Option<Vec<String>>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logs.category_cap, 20);
        assert_eq!(config.ai.provider_order.len(), 4);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.ai.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_order() {
        let mut config = Config::default();
        config.ai.provider_order.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let mut config = Config::default();
        config.logs.category_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut settings = ProviderSettings::with_model("gpt-4o");
        settings.api_key = Some("sk-secret".to_string());

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("sk-secret"));

        let debug = format!("{:?}", settings);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("cs".parse::<Language>().unwrap(), Language::Cs);
        assert_eq!("english".parse::<Language>().unwrap(), Language::En);
        assert!("de".parse::<Language>().is_err());
    }
}
