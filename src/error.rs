//! Error types for knowledge base operations.

use thiserror::Error;

/// Errors reported by [`KnowledgeBase`](crate::KnowledgeBase) operations.
///
/// A failed unification is not an error; it simply produces no match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KbError {
    /// The item to retract is not stored (nor anything structurally equal to it).
    #[error("{kind} not found in knowledge base: {item}")]
    NotFound {
        /// `"fact"` or `"rule"`
        kind: &'static str,
        /// The rendered item
        item: String,
    },

    /// `ask` was given something other than a well-formed fact.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Provenance bookkeeping is inconsistent; this is a bug in the engine.
    #[error("knowledge base invariant violated: {0}")]
    Invariant(String),

    /// Textual knowledge could not be parsed.
    #[cfg(feature = "parsing")]
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result type for knowledge base operations.
pub type KbResult<T> = Result<T, KbError>;
