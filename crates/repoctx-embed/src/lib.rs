//! Embedding provider abstraction and backend implementations.

pub mod any;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod provider;

pub use any::AnyEmbedder;
pub use error::{EmbedError, Result};
pub use provider::{EmbedProvider, embed_with_timeout};
