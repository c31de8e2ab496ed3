//! Deterministic mock embedder for tests and offline runs.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::error::{EmbedError, Result};
use crate::provider::EmbedProvider;

/// Bag-of-words hashing embedder: texts sharing tokens get similar vectors.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimensions: usize,
    pub fail: bool,
    /// Fail only for texts containing this marker.
    pub fail_on: Option<String>,
    /// Milliseconds to sleep before returning.
    pub delay_ms: u64,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimensions: 64,
            fail: false,
            fail_on: None,
            delay_ms: 0,
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_owned()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl EmbedProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            return Err(EmbedError::Other("mock embedding error".into()));
        }
        if let Some(marker) = &self.fail_on
            && text.contains(marker.as_str())
        {
            return Err(EmbedError::Other(format!("mock refused text with {marker}")));
        }
        Ok(self.vectorize(text))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_identical_vector() {
        let m = MockEmbedder::default();
        let a = m.embed("def handle(request)").await.unwrap();
        let b = m.embed("def handle(request)").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fail_on_marker_only() {
        let m = MockEmbedder::failing_on("BOOM");
        assert!(m.embed("fine text").await.is_ok());
        assert!(m.embed("text with BOOM inside").await.is_err());
    }

    #[tokio::test]
    async fn failing_always_errors() {
        assert!(MockEmbedder::failing().embed("x").await.is_err());
    }
}
