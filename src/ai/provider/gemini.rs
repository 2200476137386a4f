//! Google Gemini Provider
//!
//! `generateContent` adapter. Streaming uses the SSE variant of the same
//! endpoint (`streamGenerateContent?alt=sse`); chunk and unary payloads
//! share the candidates/content/parts shape. The API key travels in the
//! `x-goog-api-key` header, never in the URL.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

use super::sse::{gemini_text, once_stream, spawn_sse_stream};
use super::{AiProvider, ChunkStream, ProviderKind, http_client, request_error, resolve_api_key};
use crate::ai::timeout::with_timeout;
use crate::config::AiConfig;
use crate::types::{InitError, QueryError, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: &AiConfig) -> std::result::Result<Self, InitError> {
        let settings = &config.gemini;
        let api_key = resolve_api_key(ProviderKind::Gemini, settings)?;

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
            client: http_client(ProviderKind::Gemini)?,
        })
    }

    fn endpoint_url(&self, stream: bool) -> String {
        if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.api_base, self.model
            )
        } else {
            format!("{}/models/{}:generateContent", self.api_base, self.model)
        }
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn query(&self, prompt: &str, stream: bool) -> Result<ChunkStream> {
        info!(model = %self.model, stream, "Querying Gemini");

        let kind = ProviderKind::Gemini;
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let response = with_timeout(kind, self.timeout, async {
            self.client
                .post(self.endpoint_url(stream))
                .header("x-goog-api-key", self.api_key.expose_secret())
                .json(&request)
                .send()
                .await
                .map_err(|e| request_error(kind, e, self.timeout).into())
        })
        .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::from_http_status(kind.as_str(), status, &body).into());
        }

        if stream {
            return Ok(spawn_sse_stream(kind, response, self.timeout, gemini_text));
        }

        let body: serde_json::Value = with_timeout(kind, self.timeout, async {
            response
                .json()
                .await
                .map_err(|e| QueryError::classify(kind.as_str(), &e.to_string(), self.timeout).into())
        })
        .await?;

        let content = gemini_text(&body)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| QueryError::Unavailable {
                provider: kind.to_string(),
                message: "empty response".to_string(),
            })?;

        debug!(chars = content.len(), "Received complete Gemini response");
        Ok(once_stream(content))
    }
}

// Request types (the response side reuses the shared extractor).

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        let mut config = AiConfig::default();
        config.gemini.api_key = Some("key".to_string());
        GeminiProvider::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let provider = provider();
        assert!(
            provider
                .endpoint_url(true)
                .ends_with(":streamGenerateContent?alt=sse")
        );
        assert!(provider.endpoint_url(false).ends_with(":generateContent"));
        assert!(provider.endpoint_url(false).contains("gemini-2.0-flash-exp"));
    }

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "diagnose".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 4096,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "diagnose");
    }
}
