//! OpenAI API Provider
//!
//! Chat Completions adapter with SSE streaming. The wire types are shared
//! with the Mercury adapter, which speaks the same protocol at a different
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::sse::{once_stream, openai_delta, spawn_sse_stream};
use super::{AiProvider, ChunkStream, ProviderKind, http_client, request_error, resolve_api_key};
use crate::ai::timeout::with_timeout;
use crate::config::AiConfig;
use crate::types::{InitError, QueryError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI adapter with secure API key handling.
pub struct OpenAiProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> std::result::Result<Self, InitError> {
        let settings = &config.openai;
        let api_key = resolve_api_key(ProviderKind::Openai, settings)?;

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
            client: http_client(ProviderKind::Openai)?,
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn query(&self, prompt: &str, stream: bool) -> Result<ChunkStream> {
        info!(model = %self.model, stream, "Querying OpenAI");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stream,
        };

        chat_completions(
            ChatEndpoint {
                kind: ProviderKind::Openai,
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

// =============================================================================
// OpenAI-Compatible Chat Protocol (shared with Mercury)
// =============================================================================

pub(crate) struct ChatEndpoint<'a> {
    pub kind: ProviderKind,
    pub client: &'a reqwest::Client,
    pub api_base: &'a str,
    pub api_key: &'a SecretString,
    pub timeout: Duration,
}

/// Send a chat completion request; stream or unwrap according to
/// `request.stream`.
pub(crate) async fn chat_completions(
    endpoint: ChatEndpoint<'_>,
    request: ChatRequest,
) -> Result<ChunkStream> {
    let kind = endpoint.kind;
    let url = format!("{}/chat/completions", endpoint.api_base);
    let stream = request.stream;

    let response = with_timeout(kind, endpoint.timeout, async {
        endpoint
            .client
            .post(&url)
            .bearer_auth(endpoint.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(kind, e, endpoint.timeout).into())
    })
    .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(QueryError::from_http_status(kind.as_str(), status, &body).into());
    }

    if stream {
        return Ok(spawn_sse_stream(kind, response, endpoint.timeout, openai_delta));
    }

    let body: ChatResponse = with_timeout(kind, endpoint.timeout, async {
        response.json().await.map_err(|e| {
            QueryError::classify(kind.as_str(), &e.to_string(), endpoint.timeout).into()
        })
    })
    .await?;

    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| QueryError::Unavailable {
            provider: kind.to_string(),
            message: "empty response".to_string(),
        })?;

    debug!(provider = %kind, chars = content.len(), "Received complete response");
    Ok(once_stream(content))
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    pub content: Option<String>,
}
