//! Semantic retrieval and gated expansion: the query-side surface of the index.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use repoctx_embed::{EmbedProvider, embed_with_timeout};

use crate::chunk::Chunk;
use crate::error::{ExpansionError, IndexError, Result};
use crate::expansion::{Expansion, ExpansionEngine, ExpansionRequest};
use crate::store::{ChunkStore, ScoredChunk};

/// Retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Default number of nearest chunks returned (default: 5).
    pub top_k: usize,
    /// Upper bound on one query embedding call.
    pub embed_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// Reentrant read-side entry point. Safe to share across concurrent queries.
pub struct CodeRetriever<P: EmbedProvider> {
    store: ChunkStore,
    provider: Arc<P>,
    engine: ExpansionEngine,
    config: RetrievalConfig,
}

impl<P: EmbedProvider> CodeRetriever<P> {
    #[must_use]
    pub fn new(
        store: ChunkStore,
        provider: Arc<P>,
        engine: ExpansionEngine,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            provider,
            engine,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Nearest chunks to `query`, best first.
    ///
    /// `top_k` of `None` uses the configured default.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or searching the store fails.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        repo_scope: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let vector =
            embed_with_timeout(self.provider.as_ref(), query, self.config.embed_timeout).await?;
        let hits = self.store.search(vector, top_k, repo_scope).await?;
        tracing::debug!(query_len = query.len(), hits = hits.len(), "retrieved");
        Ok(hits)
    }

    /// Gate `request` through the rulebook and rank related chunks.
    ///
    /// # Errors
    ///
    /// Returns a policy rejection (see [`ExpansionEngine::expand`]) or a store failure.
    pub async fn expand(&self, request: &ExpansionRequest) -> Result<Expansion> {
        self.engine.expand(request).await
    }

    /// Like [`Self::expand`], but a policy rejection yields an empty expansion.
    ///
    /// # Errors
    ///
    /// Returns store failures only.
    pub async fn expand_or_empty(&self, request: &ExpansionRequest) -> Result<Expansion> {
        match self.engine.expand(request).await {
            Err(IndexError::Expansion(
                e @ (ExpansionError::Denied(_) | ExpansionError::UnsupportedScope(_)),
            )) => {
                tracing::warn!("no expansion: {e}");
                Ok(Expansion::default())
            }
            other => other,
        }
    }
}

/// Format chunks as XML for injection into prompts.
#[must_use]
pub fn format_as_context<'a>(chunks: impl IntoIterator<Item = (&'a Chunk, f64)>) -> String {
    let mut out = String::new();

    for (chunk, score) in chunks {
        let name = chunk
            .symbols
            .identifier()
            .unwrap_or(chunk.concrete_type.as_str());
        let (start, end) = chunk.line_span().unwrap_or((0, 0));
        let code_type = chunk.canonical_type().map_or("", |t| t.as_str());
        let _ = writeln!(
            out,
            "  <chunk file=\"{}\" lines=\"{start}-{end}\" name=\"{name}\" type=\"{code_type}\" score=\"{score:.2}\">",
            chunk.file_path,
        );
        out.push_str(&chunk.content);
        out.push_str("\n  </chunk>\n");
    }

    if out.is_empty() {
        return out;
    }
    format!("<code_context>\n{out}</code_context>")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use repoctx_embed::mock::MockEmbedder;
    use repoctx_store::InMemoryVectorStore;

    use super::*;
    use crate::chunk::{CanonicalType, ChunkDraft, ConcreteType, Symbols};
    use crate::expansion::ExpansionConfig;
    use crate::rulebook::{Intent, Rulebook, Scope};

    const HELLO_ID: &str = "6f1c2a9e-3b4d-4e8f-9a7b-0c1d2e3f4a5b";

    fn sample_chunk() -> Chunk {
        let draft = ChunkDraft::new(ConcreteType::PythonFunction, "def hello():\n    pass".into())
            .with_symbols(Symbols::Definition {
                identifier: "hello".into(),
                class_name: None,
                uses: BTreeSet::new(),
            });
        Chunk::from_draft(draft, HELLO_ID.into(), "repo", "src/app.py", 0)
    }

    async fn retriever(provider: MockEmbedder) -> CodeRetriever<MockEmbedder> {
        let store = ChunkStore::new(Arc::new(InMemoryVectorStore::new()), "chunks");
        store.ensure_collection(64).await.unwrap();
        let chunk = sample_chunk();
        let vector = MockEmbedder::default().embed(&chunk.content).await.unwrap();
        store.upsert(vec![(chunk, vector)]).await.unwrap();
        let engine = ExpansionEngine::new(
            store.clone(),
            Arc::new(Rulebook::default()),
            ExpansionConfig::default(),
        );
        CodeRetriever::new(store, Arc::new(provider), engine, RetrievalConfig::default())
    }

    #[test]
    fn format_as_context_empty() {
        assert_eq!(format_as_context(std::iter::empty()), "");
    }

    #[test]
    fn format_as_context_xml() {
        let chunk = sample_chunk();
        let xml = format_as_context([(&chunk, 0.853)]);
        assert!(xml.starts_with("<code_context>\n"));
        assert!(xml.ends_with("</code_context>"));
        assert!(xml.contains("file=\"src/app.py\""));
        assert!(xml.contains("lines=\"1-2\""));
        assert!(xml.contains("name=\"hello\""));
        assert!(xml.contains("type=\"py:function\""));
        assert!(xml.contains("score=\"0.85\""));
        assert!(xml.contains("def hello():"));
    }

    #[tokio::test]
    async fn retrieve_returns_nearest_in_scope() {
        let retriever = retriever(MockEmbedder::default()).await;
        let hits = retriever
            .retrieve("def hello", None, Some("repo"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, HELLO_ID);

        let none = retriever
            .retrieve("def hello", Some(3), Some("elsewhere"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn retrieve_surfaces_embedding_failure() {
        let retriever = retriever(MockEmbedder::failing()).await;
        let err = retriever.retrieve("q", None, None).await.unwrap_err();
        assert!(matches!(err, IndexError::Embed(_)));
    }

    #[tokio::test]
    async fn denied_expansion_is_empty_when_requested() {
        let retriever = retriever(MockEmbedder::default()).await;
        let request = ExpansionRequest {
            source_ids: vec![HELLO_ID.into()],
            requested: [CanonicalType::PyFunction].into_iter().collect(),
            scope: Scope::SameFile,
            max_chunks: 3,
            intent: Intent::Explain,
            repo_url: None,
        };
        let err = retriever.expand(&request).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::Expansion(ExpansionError::Denied(_))
        ));
        let empty = retriever.expand_or_empty(&request).await.unwrap();
        assert!(empty.chunks.is_empty());
        assert!(empty.rule.is_none());
    }
}
