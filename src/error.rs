//! Error taxonomy for the memory engine.
//!
//! [`MemoryError`] covers the four failure classes callers can observe:
//! malformed canonicalizer input, unknown unit ids, durable-store failures,
//! and JSON (de)serialization failures. Policy short-circuits are not errors —
//! a disabled tool makes `store` a no-op returning `None`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Query parameters could not be canonicalized (e.g. not a JSON object).
    /// Never surfaced from `lookup` — the caller sees a miss instead.
    #[error("invalid query parameters: {0}")]
    Validation(String),

    /// An operation referenced a memory unit id that does not exist.
    #[error("memory unit not found: {0}")]
    NotFound(String),

    /// The durable store failed. `lookup` degrades to a miss on this;
    /// every other operation propagates it.
    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),

    /// A stored JSON column failed to round-trip.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
