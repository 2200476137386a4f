//! Claude AgentAPI Provider
//!
//! Talks to a locally running AgentAPI server that fronts an authenticated
//! Claude CLI session, so no API key is involved. The protocol is
//! conversation-shaped rather than request-shaped: POST the prompt to
//! `/message`, then poll `/messages` until the agent settles.
//!
//! Responses are considered settled when the newest message is agent-role
//! and one further poll interval produces no additional messages. Terminal
//! UI frames (messages starting with `╭`) are filtered out.

use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt, TryStreamExt};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::sse::once_stream;
use super::{AiProvider, ChunkStream, ProviderKind, http_client};
use crate::config::AiConfig;
use crate::types::{InitError, QueryError, Result};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct AgentApiProvider {
    api_url: Url,
    poll_interval: Duration,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for AgentApiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentApiProvider")
            .field("api_url", &self.api_url.as_str())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl AgentApiProvider {
    pub fn new(config: &AiConfig) -> std::result::Result<Self, InitError> {
        let settings = &config.claude_agent;

        let api_url =
            Url::parse(&settings.api_url).map_err(|e| InitError::InvalidCredential {
                provider: ProviderKind::ClaudeAgent.to_string(),
                message: format!("invalid AgentAPI URL '{}': {}", settings.api_url, e),
            })?;

        Ok(Self {
            api_url,
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
            timeout: Duration::from_secs(config.timeout_secs),
            client: http_client(ProviderKind::ClaudeAgent)?,
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, QueryError> {
        self.api_url.join(path).map_err(|e| QueryError::Unavailable {
            provider: ProviderKind::ClaudeAgent.to_string(),
            message: format!("invalid endpoint path '{}': {}", path, e),
        })
    }

    async fn fetch_messages(&self) -> std::result::Result<Vec<AgentMessage>, QueryError> {
        let url = self.endpoint("messages")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::from_http_status(
                ProviderKind::ClaudeAgent.as_str(),
                status,
                &body,
            ));
        }

        let body: MessagesResponse = response.json().await.map_err(|e| transport_error(&e))?;
        Ok(body.messages)
    }

    async fn send_prompt(&self, prompt: &str) -> std::result::Result<(), QueryError> {
        let url = self.endpoint("message")?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "content": prompt, "type": "user" }))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::from_http_status(
                ProviderKind::ClaudeAgent.as_str(),
                status,
                &body,
            ));
        }

        Ok(())
    }

    /// Poll until the agent settles, forwarding new agent messages. Runs on
    /// a spawned task; a dropped receiver ends it.
    async fn poll_loop(
        self: std::sync::Arc<Self>,
        mut seen: usize,
        mut tx: mpsc::Sender<Result<String>>,
    ) {
        let deadline = Instant::now() + self.timeout;

        loop {
            if Instant::now() >= deadline {
                warn!("AgentAPI query timed out");
                let _ = tx
                    .send(Err(QueryError::Timeout {
                        provider: ProviderKind::ClaudeAgent.to_string(),
                        timeout: self.timeout,
                    }
                    .into()))
                    .await;
                return;
            }

            tokio::time::sleep(self.poll_interval).await;

            let messages = match self.fetch_messages().await {
                Ok(messages) => messages,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };

            for content in new_agent_texts(&messages, seen) {
                if tx.send(Ok(content)).await.is_err() {
                    return;
                }
            }
            // A shorter conversation means the server was reset; track its
            // length either way.
            seen = messages.len();

            // Settled: newest message is agent-role and a further interval
            // produces nothing new.
            if messages.last().is_some_and(AgentMessage::is_agent) {
                tokio::time::sleep(self.poll_interval).await;
                match self.fetch_messages().await {
                    Ok(confirm) if confirm.len() == messages.len() => {
                        debug!("AgentAPI conversation settled");
                        return;
                    }
                    Ok(confirm) => {
                        for content in new_agent_texts(&confirm, seen) {
                            if tx.send(Ok(content)).await.is_err() {
                                return;
                            }
                        }
                        seen = confirm.len();
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl AiProvider for AgentApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ClaudeAgent
    }

    fn model(&self) -> &str {
        "claude (local session)"
    }

    async fn query(&self, prompt: &str, stream: bool) -> Result<ChunkStream> {
        info!(url = %self.api_url, stream, "Querying Claude via AgentAPI");

        // Baseline the conversation so only this query's responses are
        // yielded. Doubles as the reachability check.
        let baseline = self.fetch_messages().await.map_err(unreachable_hint)?;
        self.send_prompt(prompt).await?;

        let (tx, rx) = mpsc::channel::<Result<String>>(CHANNEL_CAPACITY);
        tokio::spawn(std::sync::Arc::new(self.clone()).poll_loop(baseline.len(), tx));

        if stream {
            return Ok(rx.boxed());
        }

        let parts: Vec<String> = rx.try_collect().await?;
        Ok(once_stream(parts.join("\n")))
    }
}

/// Agent texts past the `seen` watermark. The conversation can shrink if
/// the server restarts mid-query; a watermark beyond the end yields nothing
/// rather than indexing out of bounds.
fn new_agent_texts(messages: &[AgentMessage], seen: usize) -> Vec<String> {
    messages
        .get(seen..)
        .unwrap_or_default()
        .iter()
        .filter_map(|m| m.agent_content().map(str::to_string))
        .collect()
}

fn transport_error(err: &reqwest::Error) -> QueryError {
    QueryError::classify(
        ProviderKind::ClaudeAgent.as_str(),
        &err.to_string(),
        Duration::ZERO,
    )
}

/// Make the common "server not running" case read as such instead of a raw
/// connection error.
fn unreachable_hint(err: QueryError) -> QueryError {
    match err {
        QueryError::Unavailable { provider, message } => QueryError::Unavailable {
            provider,
            message: format!("AgentAPI server not reachable ({})", message),
        },
        other => other,
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<AgentMessage>,
}

#[derive(Debug, Deserialize)]
struct AgentMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

impl AgentMessage {
    fn is_agent(&self) -> bool {
        self.role == "agent"
    }

    /// Agent text worth forwarding. Drops empty bodies and terminal UI
    /// frames the CLI paints into the conversation.
    fn agent_content(&self) -> Option<&str> {
        (self.is_agent() && !self.content.is_empty() && !self.content.starts_with('╭'))
            .then_some(self.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: &str, content: &str) -> AgentMessage {
        AgentMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_agent_content_filters_ui_frames() {
        assert_eq!(
            message("agent", "restart the unit").agent_content(),
            Some("restart the unit")
        );
        assert_eq!(message("agent", "╭─ Welcome ─╮").agent_content(), None);
        assert_eq!(message("agent", "").agent_content(), None);
        assert_eq!(message("user", "why?").agent_content(), None);
    }

    #[test]
    fn test_messages_response_tolerates_missing_fields() {
        let body = r#"{"messages":[{"role":"agent"},{"content":"x"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert!(parsed.messages[0].is_agent());
        assert!(!parsed.messages[1].is_agent());
    }

    #[test]
    fn test_new_agent_texts_past_watermark() {
        let messages = vec![
            message("user", "diagnose this"),
            message("agent", "looking"),
            message("agent", "restart nginx"),
        ];
        assert_eq!(new_agent_texts(&messages, 1), ["looking", "restart nginx"]);
        assert!(new_agent_texts(&messages, 3).is_empty());
    }

    #[test]
    fn test_shrunk_conversation_yields_nothing_without_panic() {
        // Watermark beyond the end: the server reset its conversation.
        let messages = vec![message("agent", "fresh start")];
        assert!(new_agent_texts(&messages, 5).is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let mut config = AiConfig::default();
        config.claude_agent.api_url = "not a url".to_string();
        assert!(matches!(
            AgentApiProvider::new(&config),
            Err(InitError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn test_poll_interval_floor_is_one_second() {
        let mut config = AiConfig::default();
        config.claude_agent.poll_interval_secs = 0;
        let provider = AgentApiProvider::new(&config).unwrap();
        assert_eq!(provider.poll_interval, Duration::from_secs(1));
    }
}
