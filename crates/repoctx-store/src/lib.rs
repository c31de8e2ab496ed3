//! Vector index adapters: upsert, filtered kNN, filtered paginated scan, fetch by id.

pub mod in_memory_store;
pub mod qdrant_ops;
pub mod vector_store;

pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use vector_store::{
    FieldCondition, FieldValue, Payload, PayloadPoint, ScoredVectorPoint, ScrollPage,
    ScrollRequest, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};
