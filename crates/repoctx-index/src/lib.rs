//! Structural code indexing, semantic retrieval and rulebook-gated expansion.
//!
//! Source files are split by tree-sitter into typed chunks carrying symbol
//! metadata, embedded and stored in a vector store. Queries retrieve the
//! nearest chunks; an expansion request then pulls structurally related chunks
//! from the same file, but only when a declarative rule licenses it.

pub mod chunk;
pub(crate) mod context;
pub mod error;
pub mod expansion;
pub mod extract;
pub mod indexer;
pub mod retriever;
pub mod rulebook;
pub mod store;
pub mod watcher;

pub use chunk::{CanonicalType, Chunk, ChunkMeta, ConcreteType, Language, Symbols};
pub use context::chunk_display_header;
pub use error::{ExpansionError, IndexError, Result, RulebookViolation};
pub use expansion::{Expansion, ExpansionConfig, ExpansionEngine, ExpansionRequest, RankedChunk};
pub use indexer::{CodeIndexer, IndexReport, IndexerConfig};
pub use retriever::{CodeRetriever, RetrievalConfig, format_as_context};
pub use rulebook::{ExpansionRule, Intent, Rulebook, Scope};
pub use store::{ChunkStore, DEFAULT_COLLECTION, ScoredChunk};
pub use watcher::IndexWatcher;
