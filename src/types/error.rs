//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Taxonomy
//!
//! - **InitError**: provider construction failures. A missing credential is
//!   an expected condition; the selector skips to the next candidate without
//!   a user-visible warning.
//! - **QueryError**: provider invocation failures. Every variant triggers a
//!   fallback to the next candidate with a single caller-visible warning.
//! - **AllProvidersExhausted**: terminal for the AI step only. Collected
//!   diagnostic data is still printed, and this is the sole non-zero exit
//!   path of the CLI.
//!
//! Collection and classification never raise through the pipeline; they
//! degrade and annotate the diagnostic context instead.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Provider Initialization Errors
// =============================================================================

/// Failures constructing a provider adapter.
#[derive(Debug, Clone, Error)]
pub enum InitError {
    /// No API key configured. Non-fatal: the factory moves on silently.
    #[error("{provider}: no API key configured (set {env_var})")]
    MissingCredential { provider: String, env_var: String },

    /// A credential or endpoint was supplied but is unusable.
    #[error("{provider}: invalid credential: {message}")]
    InvalidCredential { provider: String, message: String },
}

impl InitError {
    pub fn provider(&self) -> &str {
        match self {
            Self::MissingCredential { provider, .. } => provider,
            Self::InvalidCredential { provider, .. } => provider,
        }
    }
}

// =============================================================================
// Provider Query Errors
// =============================================================================

/// Failures invoking an initialized provider. All variants are fallback
/// conditions: the selector advances to the next candidate for the current
/// request, with no same-provider backoff.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Provider-specific quota or 429 equivalent.
    #[error("{provider}: rate limited: {message}")]
    RateLimited { provider: String, message: String },

    /// The bounded per-request timeout elapsed.
    #[error("{provider}: timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    /// Any other transport or auth failure.
    #[error("{provider}: unavailable: {message}")]
    Unavailable { provider: String, message: String },
}

impl QueryError {
    pub fn provider(&self) -> &str {
        match self {
            Self::RateLimited { provider, .. } => provider,
            Self::Timeout { provider, .. } => provider,
            Self::Unavailable { provider, .. } => provider,
        }
    }

    /// Classify an HTTP error status into a query error.
    pub fn from_http_status(provider: &str, status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body.trim())
        };

        match status {
            429 => Self::RateLimited {
                provider: provider.to_string(),
                message,
            },
            408 | 504 => Self::Timeout {
                provider: provider.to_string(),
                timeout: Duration::ZERO,
            },
            _ => Self::Unavailable {
                provider: provider.to_string(),
                message,
            },
        }
    }

    /// Classify a transport-level error message. Used where no HTTP status is
    /// available (connection failures, local server errors).
    pub fn classify(provider: &str, message: &str, timeout: Duration) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota")
        {
            return Self::RateLimited {
                provider: provider.to_string(),
                message: message.to_string(),
            };
        }

        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::Timeout {
                provider: provider.to_string(),
                timeout,
            };
        }

        Self::Unavailable {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SosError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// Every candidate in the fallback order failed. The diagnostic data
    /// gathered before the AI step is still shown to the user.
    #[error("all AI providers exhausted (tried: {})", .attempted.join(", "))]
    AllProvidersExhausted { attempted: Vec<String> },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("config error: {0}")]
    Config(String),
}

impl SosError {
    /// Whether this error should trigger fallback to the next provider.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}

pub type Result<T> = std::result::Result<T, SosError>;

// =============================================================================
// Tests
// =============================================================================
