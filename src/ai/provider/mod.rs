//! AI Provider Abstraction
//!
//! Defines the `AiProvider` trait every backend adapter implements, the
//! closed set of provider kinds, and the registry the selector uses to
//! construct adapters on demand.
//!
//! ## Modules
//!
//! - `selector`: ordered fallback across configured providers
//! - `sse`: shared server-sent-events streaming plumbing
//! - `openai` / `gemini` / `mercury`: API-key backed HTTP adapters
//! - `agent_api`: local OAuth-session adapter (Claude via AgentAPI)

mod agent_api;
mod gemini;
mod mercury;
mod openai;
pub mod selector;
pub(crate) mod sse;

pub use agent_api::AgentApiProvider;
pub use gemini::GeminiProvider;
pub use mercury::MercuryProvider;
pub use openai::OpenAiProvider;
pub use selector::{FallbackWarning, ProviderSelector, QueryOutcome, SelectionFailure};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::config::{AiConfig, ProviderSettings};
use crate::types::{InitError, QueryError, Result};

/// Response chunks as they arrive. Non-streaming responses are a one-chunk
/// stream; dropping the stream cancels the underlying request.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// Shared provider handle.
pub type SharedProvider = Arc<dyn AiProvider + Send + Sync>;

// =============================================================================
// Provider Kinds
// =============================================================================

/// Closed set of supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Openai,
    Gemini,
    Mercury,
    ClaudeAgent,
}

impl ProviderKind {
    /// Default fallback preference. The local agent goes last: it depends on
    /// a separately running server, so remote APIs get first shot.
    pub const DEFAULT_ORDER: [ProviderKind; 4] = [
        ProviderKind::Openai,
        ProviderKind::Gemini,
        ProviderKind::Mercury,
        ProviderKind::ClaudeAgent,
    ];

    /// Environment variable holding the API key. `None` for the local agent,
    /// which authenticates via its own OAuth session.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Mercury => Some("INCEPTION_API_KEY"),
            Self::ClaudeAgent => None,
        }
    }

    /// Prompt style the assembler should use for this backend.
    pub fn prompt_style(&self) -> PromptStyle {
        match self {
            Self::Mercury => PromptStyle::Diffusion,
            _ => PromptStyle::Linear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Gemini => "gemini",
            Self::Mercury => "mercury",
            Self::ClaudeAgent => "claude-agent",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "gemini" => Ok(Self::Gemini),
            "mercury" => Ok(Self::Mercury),
            "claude-agent" | "claude" | "agent" => Ok(Self::ClaudeAgent),
            _ => Err(format!(
                "Invalid provider '{}'. Valid values: openai, gemini, mercury, claude-agent",
                s
            )),
        }
    }
}

/// How a backend consumes prompts. Diffusion models re-generate the whole
/// response per step and tend to echo prompt structure back, so the
/// assembler adds output-shape directives for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    Linear,
    Diffusion,
}

// =============================================================================
// Provider Trait
// =============================================================================

/// One AI backend. Adapters hold their credential and HTTP client; prompt
/// content arrives fully assembled, already tailored to this backend.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Send one prompt. With `stream` set, chunks arrive as the backend
    /// produces them; otherwise the stream yields the complete response once.
    async fn query(&self, prompt: &str, stream: bool) -> Result<ChunkStream>;
}

impl std::fmt::Debug for dyn AiProvider + Send + Sync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiProvider")
            .field("kind", &self.kind())
            .field("model", &self.model())
            .finish()
    }
}

// =============================================================================
// Provider Registry
// =============================================================================

type Constructor =
    Box<dyn Fn(&AiConfig) -> std::result::Result<SharedProvider, InitError> + Send + Sync>;

/// Maps provider kinds to constructors. The built-in table covers the four
/// real backends; tests swap in mock constructors.
pub struct ProviderRegistry {
    constructors: Vec<(ProviderKind, Constructor)>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: Vec::new(),
        }
    }

    /// Registry over the built-in adapters.
    pub fn builtin() -> Self {
        Self::empty()
            .with(ProviderKind::Openai, |config| {
                Ok(Arc::new(OpenAiProvider::new(config)?) as SharedProvider)
            })
            .with(ProviderKind::Gemini, |config| {
                Ok(Arc::new(GeminiProvider::new(config)?) as SharedProvider)
            })
            .with(ProviderKind::Mercury, |config| {
                Ok(Arc::new(MercuryProvider::new(config)?) as SharedProvider)
            })
            .with(ProviderKind::ClaudeAgent, |config| {
                Ok(Arc::new(AgentApiProvider::new(config)?) as SharedProvider)
            })
    }

    /// Register (or replace) a constructor for a kind.
    pub fn with<F>(mut self, kind: ProviderKind, constructor: F) -> Self
    where
        F: Fn(&AiConfig) -> std::result::Result<SharedProvider, InitError> + Send + Sync + 'static,
    {
        self.constructors.retain(|(k, _)| *k != kind);
        self.constructors.push((kind, Box::new(constructor)));
        self
    }

    /// Construct an adapter for a kind. Unregistered kinds read as missing
    /// credentials so the selector skips them silently.
    pub fn create(
        &self,
        kind: ProviderKind,
        config: &AiConfig,
    ) -> std::result::Result<SharedProvider, InitError> {
        match self.constructors.iter().find(|(k, _)| *k == kind) {
            Some((_, constructor)) => constructor(config),
            None => Err(InitError::MissingCredential {
                provider: kind.to_string(),
                env_var: kind.env_var().unwrap_or("-").to_string(),
            }),
        }
    }
}

// =============================================================================
// Shared Adapter Helpers
// =============================================================================

/// Resolve the API key for a key-backed provider: explicit config value
/// first, then the provider's environment variable.
pub(crate) fn resolve_api_key(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> std::result::Result<SecretString, InitError> {
    let env_var = kind.env_var().unwrap_or("-");

    settings
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| InitError::MissingCredential {
            provider: kind.to_string(),
            env_var: env_var.to_string(),
        })
}

/// Build the HTTP client every adapter shares the shape of. The request
/// deadline is enforced separately via `with_timeout`, so only connection
/// establishment is bounded here.
pub(crate) fn http_client(kind: ProviderKind) -> std::result::Result<reqwest::Client, InitError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| InitError::InvalidCredential {
            provider: kind.to_string(),
            message: format!("failed to build HTTP client: {}", e),
        })
}

/// Map a transport error from reqwest into the query error taxonomy.
pub(crate) fn request_error(kind: ProviderKind, err: reqwest::Error, timeout: Duration) -> QueryError {
    if err.is_timeout() {
        QueryError::Timeout {
            provider: kind.to_string(),
            timeout,
        }
    } else {
        QueryError::classify(kind.as_str(), &err.to_string(), timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ProviderKind::DEFAULT_ORDER {
            let parsed: ProviderKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("grok".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_only_mercury_is_diffusion() {
        assert_eq!(ProviderKind::Mercury.prompt_style(), PromptStyle::Diffusion);
        assert_eq!(ProviderKind::Openai.prompt_style(), PromptStyle::Linear);
        assert_eq!(ProviderKind::ClaudeAgent.prompt_style(), PromptStyle::Linear);
    }

    #[test]
    fn test_agent_has_no_env_var() {
        assert_eq!(ProviderKind::ClaudeAgent.env_var(), None);
        assert_eq!(ProviderKind::Openai.env_var(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let settings = ProviderSettings {
            model: "gpt-4o".to_string(),
            api_key: Some("sk-from-config".to_string()),
            api_base: None,
        };
        let key = resolve_api_key(ProviderKind::Openai, &settings).unwrap();
        use secrecy::ExposeSecret;
        assert_eq!(key.expose_secret(), "sk-from-config");
    }

    #[test]
    fn test_resolve_api_key_missing_is_init_error() {
        let settings = ProviderSettings {
            model: "mercury-coder".to_string(),
            api_key: None,
            api_base: None,
        };
        // INCEPTION_API_KEY is not set in the test environment.
        if std::env::var("INCEPTION_API_KEY").is_err() {
            let err = resolve_api_key(ProviderKind::Mercury, &settings).unwrap_err();
            assert!(matches!(err, InitError::MissingCredential { .. }));
        }
    }

    #[test]
    fn test_registry_create_unregistered_reads_as_missing() {
        let registry = ProviderRegistry::empty();
        let err = registry
            .create(ProviderKind::Openai, &AiConfig::default())
            .unwrap_err();
        assert!(matches!(err, InitError::MissingCredential { .. }));
    }
}
