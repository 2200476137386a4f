//! Inception Mercury Provider
//!
//! Diffusion LLM behind an OpenAI-compatible chat endpoint, so the wire
//! protocol is reused from the OpenAI adapter. What differs is the prompt
//! style: the assembler adds output-shape directives for diffusion models,
//! keyed off `ProviderKind::Mercury`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::info;

use super::openai::{ChatEndpoint, ChatMessage, ChatRequest, chat_completions};
use super::{AiProvider, ChunkStream, ProviderKind, http_client, resolve_api_key};
use crate::config::AiConfig;
use crate::types::{InitError, Result};

const DEFAULT_API_BASE: &str = "https://api.inceptionlabs.ai/v1";

pub struct MercuryProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for MercuryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercuryProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl MercuryProvider {
    pub fn new(config: &AiConfig) -> std::result::Result<Self, InitError> {
        let settings = &config.mercury;
        let api_key = resolve_api_key(ProviderKind::Mercury, settings)?;

        Ok(Self {
            api_key,
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: settings.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
            client: http_client(ProviderKind::Mercury)?,
        })
    }
}

#[async_trait]
impl AiProvider for MercuryProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mercury
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn query(&self, prompt: &str, stream: bool) -> Result<ChunkStream> {
        info!(model = %self.model, stream, "Querying Mercury");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stream,
        };

        chat_completions(
            ChatEndpoint {
                kind: ProviderKind::Mercury,
                client: &self.client,
                api_base: &self.api_base,
                api_key: &self.api_key,
                timeout: self.timeout,
            },
            request,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_inception_default_base() {
        let mut config = AiConfig::default();
        config.mercury.api_key = Some("key".to_string());
        let provider = MercuryProvider::new(&config).unwrap();
        assert_eq!(provider.api_base, DEFAULT_API_BASE);
        assert_eq!(provider.model(), "mercury-coder");
    }

    #[test]
    fn test_new_without_credential_is_missing() {
        let mut config = AiConfig::default();
        config.mercury.api_key = None;
        if std::env::var("INCEPTION_API_KEY").is_err() {
            assert!(matches!(
                MercuryProvider::new(&config),
                Err(InitError::MissingCredential { .. })
            ));
        }
    }
}
