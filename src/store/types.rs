//! Core memory-unit type definitions.
//!
//! Defines [`Tier`] (retention classes), [`Relationship`] (dependency link
//! strength), [`ChangeKind`] (entity mutation kinds), [`Dependency`], and
//! [`MemoryUnit`] (a full cached-query record).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Retention class of a memory unit. The three active tiers govern default
/// expiry; `Archived` is the terminal state written by lifecycle sweeps and
/// is never returned by retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ShortTerm,
    MidTerm,
    LongTerm,
    Archived,
}

impl Tier {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::MidTerm => "mid_term",
            Self::LongTerm => "long_term",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(Self::ShortTerm),
            "mid_term" => Ok(Self::MidTerm),
            "long_term" => Ok(Self::LongTerm),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("unknown tier: {s}")),
        }
    }
}

/// Strength of a dependency link from a cached unit to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Primary,
    Secondary,
    Reference,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Reference => "reference",
        }
    }

    /// Ordering used when duplicate dependency tuples conflict — the
    /// strongest relationship wins.
    pub fn strength(&self) -> u8 {
        match self {
            Self::Primary => 3,
            Self::Secondary => 2,
            Self::Reference => 1,
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "reference" => Ok(Self::Reference),
            _ => Err(format!("unknown relationship: {s}")),
        }
    }
}

/// Kind of entity mutation reported to the invalidation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            _ => Err(format!("unknown change kind: {s}")),
        }
    }
}

/// A tagged link from a cached unit to an entity whose changes affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub entity_type: String,
    pub entity_id: String,
    pub relationship: Relationship,
}

impl Dependency {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        relationship: Relationship,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            relationship,
        }
    }
}

/// Collapse duplicate `(entity_type, entity_id)` tuples, keeping the
/// strongest relationship. Preserves first-seen order.
pub fn dedupe_dependencies(deps: Vec<Dependency>) -> Vec<Dependency> {
    let mut out: Vec<Dependency> = Vec::with_capacity(deps.len());
    for dep in deps {
        if let Some(existing) = out
            .iter_mut()
            .find(|d| d.entity_type == dep.entity_type && d.entity_id == dep.entity_id)
        {
            if dep.relationship.strength() > existing.relationship.strength() {
                existing.relationship = dep.relationship;
            }
        } else {
            out.push(dep);
        }
    }
    out
}

/// A cached-query record, matching the `memory_units` table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUnit {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// Tool whose invocation this unit caches.
    pub tool_name: String,
    /// Stable hash of `(tool_name, abstract_params)`.
    pub fingerprint: String,
    /// Raw parameters as supplied by the caller.
    pub original_params: Value,
    /// Abstracted parameters the fingerprint was derived from.
    pub abstract_params: Value,
    /// Tool base weight plus parameter-shape weight.
    pub complexity: f64,
    /// `true` for aggregated multi-step context units.
    pub is_compound: bool,
    /// Session context this unit belongs to, if any.
    pub context_id: Option<String>,
    /// Opaque result payload. The cache never validates its shape.
    pub payload: Value,
    /// ISO 8601 timestamp of the original computation.
    pub computed_at: String,
    /// Trust score in `[0.0, 1.0]`; gates retrieval and decays on change.
    pub confidence: f64,
    /// `true` once explicitly confirmed by the caller.
    pub validated: bool,
    /// Times this unit was touched (creation counts as the first access).
    pub access_count: u32,
    /// Times this unit was returned by retrieval.
    pub hit_count: u32,
    /// ISO 8601 timestamp of the last access, or `None` if never accessed
    /// after creation.
    pub last_accessed: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Retention class.
    pub tier: Tier,
    /// Expiry instant; `None` for long_term units.
    pub expires_at: Option<String>,
    /// Free-form labels (`compound`, category tags, …).
    pub tags: Vec<String>,
    /// Entity links, strongest relationship per entity.
    pub dependencies: Vec<Dependency>,
    /// Associated unit ids (bidirectional, not ownership).
    pub related: Vec<String>,
}
