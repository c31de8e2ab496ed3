use serde::{Deserialize, Serialize};

use repoctx_index::ExpansionRule;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
    /// Ordered allow-rules; the first matching rule licenses an expansion.
    #[serde(default)]
    pub expansion_rules: Vec<ExpansionRule>,
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProviderKind {
    #[default]
    Ollama,
    /// Deterministic offline embedder; only available with the `mock` feature.
    Mock,
}

impl EmbedProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for EmbedProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbedProviderKind,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbedProviderKind::default(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    repoctx_index::DEFAULT_COLLECTION.into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_oversize_factor() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Blind window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// HTML blocks longer than `chunk_size * oversize_factor` are subdivided.
    #[serde(default = "default_oversize_factor")]
    pub oversize_factor: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            oversize_factor: default_oversize_factor(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    ["md", "txt", "py", "js", "html"]
        .map(str::to_owned)
        .to_vec()
}

fn default_ignore_dirs() -> Vec<String> {
    [".git", "__pycache__", "node_modules", "venv"]
        .map(str::to_owned)
        .to_vec()
}

fn default_concurrency() -> usize {
    4
}

fn default_watch_debounce_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            ignore_dirs: default_ignore_dirs(),
            concurrency: default_concurrency(),
            watch_debounce_ms: default_watch_debounce_ms(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_scan_cap() -> usize {
    2048
}

fn default_scan_page_size() -> usize {
    256
}

fn default_pool_floor() -> usize {
    32
}

fn default_pool_multiplier() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpansionConfig {
    /// Hard ceiling on points scanned per expansion.
    #[serde(default = "default_scan_cap")]
    pub scan_cap: usize,
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,
    #[serde(default = "default_pool_floor")]
    pub pool_floor: usize,
    #[serde(default = "default_pool_multiplier")]
    pub pool_multiplier: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            scan_cap: default_scan_cap(),
            scan_page_size: default_scan_page_size(),
            pool_floor: default_pool_floor(),
            pool_multiplier: default_pool_multiplier(),
        }
    }
}
