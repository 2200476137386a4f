//! Provider Selection and Fallback
//!
//! Walks the configured provider order, one attempt per candidate, no
//! same-provider retries. A candidate whose credential is absent is skipped
//! without comment; a candidate that fails after initialization contributes
//! exactly one caller-visible warning. The prompt is re-assembled per
//! candidate so each backend receives its own prompt style.

use tracing::{debug, warn};

use super::{ProviderKind, ProviderRegistry, ChunkStream};
use crate::config::AiConfig;
use crate::types::{InitError, SosError};

/// One fallback step the user should know about.
#[derive(Debug, Clone)]
pub struct FallbackWarning {
    pub provider: String,
    pub message: String,
}

impl std::fmt::Display for FallbackWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed ({}); trying next provider",
            self.provider, self.message
        )
    }
}

/// A successful selection: the winning provider's response stream plus the
/// warnings accumulated on the way to it.
pub struct QueryOutcome {
    pub provider: ProviderKind,
    pub model: String,
    pub stream: ChunkStream,
    pub warnings: Vec<FallbackWarning>,
}

impl std::fmt::Debug for QueryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOutcome")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

/// Terminal failure: every candidate was skipped or failed. Carries the
/// warnings so the caller can still surface them before reporting raw
/// findings.
#[derive(Debug)]
pub struct SelectionFailure {
    pub attempted: Vec<String>,
    pub warnings: Vec<FallbackWarning>,
}

impl From<SelectionFailure> for SosError {
    fn from(failure: SelectionFailure) -> Self {
        SosError::AllProvidersExhausted {
            attempted: failure.attempted,
        }
    }
}

pub struct ProviderSelector {
    registry: ProviderRegistry,
    config: AiConfig,
}

impl ProviderSelector {
    pub fn new(registry: ProviderRegistry, config: AiConfig) -> Self {
        Self { registry, config }
    }

    /// Candidate order for this run. An explicit request moves that provider
    /// to the front of the configured order.
    pub fn candidate_order(&self, explicit: Option<ProviderKind>) -> Vec<ProviderKind> {
        let mut order = self.config.provider_order.clone();
        if let Some(kind) = explicit {
            order.retain(|k| *k != kind);
            order.insert(0, kind);
        }
        order
    }

    /// Try candidates in order until one yields a response stream.
    ///
    /// `assemble` produces the prompt for a given candidate, letting the
    /// caller tailor content to the backend's prompt style.
    pub async fn query<F>(
        &self,
        assemble: F,
        stream: bool,
        explicit: Option<ProviderKind>,
    ) -> std::result::Result<QueryOutcome, SelectionFailure>
    where
        F: Fn(ProviderKind) -> String,
    {
        let mut warnings: Vec<FallbackWarning> = Vec::new();
        let mut attempted: Vec<String> = Vec::new();

        for kind in self.candidate_order(explicit) {
            let provider = match self.registry.create(kind, &self.config) {
                Ok(provider) => provider,
                Err(InitError::MissingCredential { provider, env_var }) => {
                    debug!(%provider, %env_var, "Skipping provider without credential");
                    continue;
                }
                Err(e) => {
                    attempted.push(kind.to_string());
                    let warning = FallbackWarning {
                        provider: kind.to_string(),
                        message: e.to_string(),
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                    continue;
                }
            };

            attempted.push(kind.to_string());
            let prompt = assemble(kind);

            match provider.query(&prompt, stream).await {
                Ok(chunks) => {
                    return Ok(QueryOutcome {
                        provider: kind,
                        model: provider.model().to_string(),
                        stream: chunks,
                        warnings,
                    });
                }
                Err(e) => {
                    let warning = FallbackWarning {
                        provider: kind.to_string(),
                        message: e.to_string(),
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                }
            }
        }

        Err(SelectionFailure {
            attempted,
            warnings,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::sse::once_stream;
    use crate::ai::provider::{AiProvider, SharedProvider};
    use crate::types::{QueryError, Result};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        TimeOut,
        RateLimit,
    }

    struct MockProvider {
        kind: ProviderKind,
        behavior: Behavior,
    }

    #[async_trait]
    impl AiProvider for MockProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn query(&self, prompt: &str, _stream: bool) -> Result<ChunkStream> {
            match self.behavior {
                Behavior::Succeed => Ok(once_stream(format!("answer to: {prompt}"))),
                Behavior::TimeOut => Err(QueryError::Timeout {
                    provider: self.kind.to_string(),
                    timeout: Duration::from_secs(60),
                }
                .into()),
                Behavior::RateLimit => Err(QueryError::RateLimited {
                    provider: self.kind.to_string(),
                    message: "429".to_string(),
                }
                .into()),
            }
        }
    }

    fn registry_with(entries: &[(ProviderKind, Option<Behavior>)]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::empty();
        for (kind, behavior) in entries {
            let kind = *kind;
            match behavior {
                Some(behavior) => {
                    let behavior = *behavior;
                    registry = registry.with(kind, move |_| {
                        Ok(Arc::new(MockProvider { kind, behavior }) as SharedProvider)
                    });
                }
                None => {
                    registry = registry.with(kind, move |_| {
                        Err(InitError::MissingCredential {
                            provider: kind.to_string(),
                            env_var: "TEST_KEY".to_string(),
                        })
                    });
                }
            }
        }
        registry
    }

    fn config_with_order(order: &[ProviderKind]) -> AiConfig {
        let mut config = AiConfig::default();
        config.provider_order = order.to_vec();
        config
    }

    #[tokio::test]
    async fn test_fallback_skips_missing_credential_silently() {
        // openai has no credential, gemini times out, mercury succeeds.
        let registry = registry_with(&[
            (ProviderKind::Openai, None),
            (ProviderKind::Gemini, Some(Behavior::TimeOut)),
            (ProviderKind::Mercury, Some(Behavior::Succeed)),
        ]);
        let selector = ProviderSelector::new(
            registry,
            config_with_order(&[
                ProviderKind::Openai,
                ProviderKind::Gemini,
                ProviderKind::Mercury,
            ]),
        );

        let mut outcome = selector
            .query(|_| "prompt".to_string(), false, None)
            .await
            .unwrap();

        assert_eq!(outcome.provider, ProviderKind::Mercury);
        // Exactly one warning: gemini's timeout. The credential skip is silent.
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].provider, "gemini");

        let chunk = outcome.stream.next().await.unwrap().unwrap();
        assert!(chunk.contains("answer to"));
    }

    #[tokio::test]
    async fn test_first_healthy_provider_produces_no_warnings() {
        let registry = registry_with(&[(ProviderKind::Openai, Some(Behavior::Succeed))]);
        let selector =
            ProviderSelector::new(registry, config_with_order(&[ProviderKind::Openai]));

        let outcome = selector
            .query(|_| "prompt".to_string(), true, None)
            .await
            .unwrap();
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_lists_attempted_providers() {
        let registry = registry_with(&[
            (ProviderKind::Openai, Some(Behavior::RateLimit)),
            (ProviderKind::Gemini, None),
            (ProviderKind::Mercury, Some(Behavior::TimeOut)),
        ]);
        let selector = ProviderSelector::new(
            registry,
            config_with_order(&[
                ProviderKind::Openai,
                ProviderKind::Gemini,
                ProviderKind::Mercury,
            ]),
        );

        let failure = selector
            .query(|_| "prompt".to_string(), false, None)
            .await
            .unwrap_err();

        assert_eq!(failure.attempted, ["openai", "mercury"]);
        assert_eq!(failure.warnings.len(), 2);

        let err: SosError = failure.into();
        assert!(err.to_string().contains("openai, mercury"));
    }

    #[tokio::test]
    async fn test_all_skipped_is_still_exhaustion() {
        let registry = registry_with(&[(ProviderKind::Openai, None)]);
        let selector =
            ProviderSelector::new(registry, config_with_order(&[ProviderKind::Openai]));

        let failure = selector
            .query(|_| "prompt".to_string(), false, None)
            .await
            .unwrap_err();
        assert!(failure.attempted.is_empty());
        assert!(failure.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_provider_moves_to_front() {
        let registry = registry_with(&[
            (ProviderKind::Openai, Some(Behavior::Succeed)),
            (ProviderKind::Mercury, Some(Behavior::Succeed)),
        ]);
        let selector = ProviderSelector::new(
            registry,
            config_with_order(&[ProviderKind::Openai, ProviderKind::Mercury]),
        );

        assert_eq!(
            selector.candidate_order(Some(ProviderKind::Mercury)),
            vec![ProviderKind::Mercury, ProviderKind::Openai]
        );

        let outcome = selector
            .query(|_| "prompt".to_string(), false, Some(ProviderKind::Mercury))
            .await
            .unwrap();
        assert_eq!(outcome.provider, ProviderKind::Mercury);
    }

    #[tokio::test]
    async fn test_prompt_reassembled_per_candidate() {
        let registry = registry_with(&[
            (ProviderKind::Openai, Some(Behavior::RateLimit)),
            (ProviderKind::Mercury, Some(Behavior::Succeed)),
        ]);
        let selector = ProviderSelector::new(
            registry,
            config_with_order(&[ProviderKind::Openai, ProviderKind::Mercury]),
        );

        let mut outcome = selector
            .query(|kind| format!("prompt for {kind}"), false, None)
            .await
            .unwrap();

        let chunk = outcome.stream.next().await.unwrap().unwrap();
        assert!(chunk.contains("prompt for mercury"));
    }
}
