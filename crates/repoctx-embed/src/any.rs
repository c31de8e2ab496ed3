#[cfg(any(test, feature = "mock"))]
use crate::mock::MockEmbedder;
use crate::ollama::OllamaEmbedder;
use crate::{EmbedProvider, Result};

macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Ollama($p) => $expr,
            #[cfg(any(test, feature = "mock"))]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

/// Runtime-selected embedding backend.
#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Ollama(OllamaEmbedder),
    #[cfg(any(test, feature = "mock"))]
    Mock(MockEmbedder),
}

impl EmbedProvider for AnyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        delegate_embedder!(self, |p| p.embed(text).await)
    }

    fn name(&self) -> &'static str {
        delegate_embedder!(self, |p| p.name())
    }
}
