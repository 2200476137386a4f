//! Per-Request Timeout
//!
//! Every provider attempt is bounded by the configured `ai.timeout_secs`.
//! An elapsed deadline becomes `QueryError::Timeout`, which is a fallback
//! condition like any other query failure.

use std::future::Future;
use std::time::Duration;

use crate::ai::provider::ProviderKind;
use crate::types::{QueryError, Result};

/// Execute a provider operation with a deadline.
pub async fn with_timeout<T, F>(kind: ProviderKind, timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(QueryError::Timeout {
            provider: kind.to_string(),
            timeout,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SosError;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(ProviderKind::Openai, Duration::from_secs(1), async {
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(ProviderKind::Gemini, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result.unwrap_err() {
            SosError::Query(QueryError::Timeout { provider, .. }) => {
                assert_eq!(provider, "gemini");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
