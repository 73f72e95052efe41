//! Semantic query memory for assistant backends.
//!
//! mnemo decides, for every tool invocation a personal-data assistant makes,
//! whether a previously computed result can be reused instead of recomputed,
//! how long a cached result remains trustworthy, and how entity changes
//! elsewhere in the system degrade or invalidate it.
//!
//! | Concern | Mechanism |
//! |---------|-----------|
//! | Recognizing "the same query" | per-tool abstraction + canonical-JSON fingerprint |
//! | Near-miss reuse | structural similarity with tunable floors |
//! | Trust over time | tiered expiry + confidence decay |
//! | Staying consistent | dependency graph reacting to entity-change events |
//! | Session chains | compound context units cached as one aggregate |
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with per-unit atomic writes and indexed
//!   queries by fingerprint, context, dependency, tier, and confidence
//! - **Lookup**: exact fingerprint → context-scoped → bounded fuzzy scan
//! - **Background**: bounded task queue for hit recording and link
//!   discovery; periodic decay/expiry/purge sweeps
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization, schema, and migrations
//! - [`canonical`] — Parameter abstraction, complexity scoring, fingerprinting
//! - [`similarity`] — Structural similarity between parameter trees
//! - [`policy`] — Tool/category caching policy table
//! - [`store`] — Memory units: retrieval, compound contexts, invalidation,
//!   lifecycle, stats
//! - [`engine`] — The service façade callers hold
//! - [`scheduler`] — Periodic lifecycle driver

pub mod canonical;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod policy;
pub mod scheduler;
pub mod similarity;
pub mod store;

pub use engine::{MemoryEngine, StoreOptions};
pub use error::MemoryError;
