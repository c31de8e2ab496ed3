//! Error types for repoctx-index.

use std::collections::BTreeSet;
use std::num::TryFromIntError;

use crate::chunk::CanonicalType;
use crate::rulebook::{Intent, Scope};

/// Errors that can occur during indexing, retrieval and expansion.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Vector store error. Fatal for the in-flight operation.
    #[error("vector store error: {0}")]
    Store(#[from] repoctx_store::VectorStoreError),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embed(#[from] repoctx_embed::EmbedError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored payload is missing a field or carries an unexpected value.
    #[error("malformed payload for point {id}: {reason}")]
    Payload { id: String, reason: String },

    /// Expansion request rejected before ranking.
    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    /// File watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// No configured rule licenses an expansion request.
///
/// Callers treat this as "no expansion", never as a fatal error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "no expansion rule allows intent {intent:?} with requested types [{}] in scope {scope}",
    format_types(.requested)
)]
pub struct RulebookViolation {
    pub intent: Intent,
    pub requested: BTreeSet<CanonicalType>,
    pub scope: Scope,
    pub max_chunks: usize,
}

fn format_types(types: &BTreeSet<CanonicalType>) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reasons an expansion request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpansionError {
    #[error("unsupported expansion scope: {0}")]
    UnsupportedScope(String),

    #[error("unknown canonical code type: {0}")]
    UnknownCodeType(String),

    #[error("unknown intent: {0}")]
    UnknownIntent(String),

    #[error(transparent)]
    Denied(#[from] RulebookViolation),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_message_echoes_request() {
        let violation = RulebookViolation {
            intent: Intent::Modify,
            requested: [CanonicalType::PyFunction, CanonicalType::PyImports]
                .into_iter()
                .collect(),
            scope: Scope::SameFile,
            max_chunks: 4,
        };
        let msg = violation.to_string();
        assert!(msg.contains("Modify"));
        assert!(msg.contains("py:imports, py:function"));
        assert!(msg.contains("same_file"));
    }

    #[test]
    fn expansion_error_wraps_into_index_error() {
        let err: IndexError = ExpansionError::UnsupportedScope("repo".into()).into();
        assert_eq!(err.to_string(), "unsupported expansion scope: repo");
    }
}
