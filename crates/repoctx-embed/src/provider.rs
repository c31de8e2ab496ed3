use std::time::Duration;

use crate::error::{EmbedError, Result};

/// Black-box `text -> vector` function used for both ingestion and queries.
pub trait EmbedProvider: Send + Sync {
    /// Compute an embedding vector for `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or returns no vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;

    fn name(&self) -> &'static str;
}

/// Embed `text` with an upper bound on wall time.
///
/// A zero-length vector is reported as [`EmbedError::EmptyResponse`] so callers
/// never store degenerate points.
///
/// # Errors
///
/// Returns [`EmbedError::Timeout`] if the provider does not answer within `timeout`,
/// or the provider's own error.
pub async fn embed_with_timeout<P: EmbedProvider>(
    provider: &P,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    let vector = tokio::time::timeout(timeout, provider.embed(text))
        .await
        .map_err(|_| EmbedError::Timeout(timeout))??;

    if vector.is_empty() {
        return Err(EmbedError::EmptyResponse {
            provider: provider.name(),
        });
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;

    #[tokio::test]
    async fn returns_vector_within_timeout() {
        let provider = MockEmbedder::default();
        let v = embed_with_timeout(&provider, "fn main", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(v.len(), provider.dimensions);
    }

    #[tokio::test]
    async fn empty_vector_is_error() {
        let provider = MockEmbedder {
            dimensions: 0,
            ..MockEmbedder::default()
        };
        let err = embed_with_timeout(&provider, "x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::EmptyResponse { provider: "mock" }));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = MockEmbedder::default().with_delay(200);
        let err = embed_with_timeout(&provider, "x", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::Timeout(_)));
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let provider = MockEmbedder::failing();
        let err = embed_with_timeout(&provider, "x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::Other(_)));
    }
}
