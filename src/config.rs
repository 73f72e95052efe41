use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MnemoConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub similarity: SimilarityConfig,
    pub invalidation: InvalidationConfig,
    pub compound: CompoundConfig,
    pub lifecycle: LifecycleConfig,
    /// Per-tool policy overrides, applied on top of the built-in table.
    pub policy: Vec<PolicyOverride>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Knobs for the lookup pipeline.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Queries below this complexity are not cache candidates unless they
    /// carry a context id.
    pub min_complexity: f64,
    /// Similarity a compound step must reach for a context match.
    pub context_similarity: f64,
    /// Fuzzy candidates must score above this (similarity + metadata bonus).
    pub fuzzy_accept_score: f64,
    /// Fuzzy candidates keep their confidence requirement at this fraction
    /// of the caller's threshold.
    pub fuzzy_confidence_factor: f64,
    /// Upper bound on candidates examined by the fuzzy scan.
    pub fuzzy_scan_limit: usize,
    /// Bonus added when discriminating metadata (category/route tag) agrees.
    pub fuzzy_metadata_bonus: f64,
}

/// Knobs for the structural similarity scorer.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimilarityConfig {
    /// String scores below this are clamped to zero.
    pub string_floor: f64,
    /// Fixed score for sensitive strings that share a core keyword.
    pub sensitive_score: f64,
    /// Pairwise similarity above which two array elements count as matched.
    pub array_match_threshold: f64,
}

/// Relationship-weighted confidence multipliers for entity-change cascades.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InvalidationConfig {
    pub primary_factor: f64,
    pub secondary_factor: f64,
    pub reference_factor: f64,
    /// Light discount applied to reference-relationship units on `created`.
    pub created_reference_factor: f64,
}

/// Tier/confidence breakpoints for compound context units.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompoundConfig {
    /// Bonus per step rewarding chains of related lookups, and its cap.
    pub relational_bonus_per_step: f64,
    pub relational_bonus_cap: f64,
    /// Total complexity at or above this lands in long_term.
    pub long_term_complexity: f64,
    /// Total complexity at or above this lands in mid_term.
    pub mid_term_complexity: f64,
    pub long_term_confidence: f64,
    pub mid_term_confidence: f64,
    pub short_term_confidence: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Seconds between background sweep runs.
    pub sweep_interval_secs: u64,
    /// Seconds between background stats refreshes.
    pub stats_interval_secs: u64,
    /// short_term units idle longer than this are decay-archive candidates.
    pub decay_idle_days: i64,
    /// Decay candidates must have fewer accesses than this.
    pub decay_max_access: u32,
    /// Decay candidates must have confidence below this.
    pub decay_confidence_floor: f64,
    /// Archived units untouched this long are hard-deleted.
    pub purge_age_days: i64,
    /// short_term → mid_term at more accesses than this, or older than
    /// `promote_mid_age_days`.
    pub promote_mid_access: u32,
    pub promote_mid_age_days: i64,
    /// mid_term → long_term thresholds.
    pub promote_long_access: u32,
    pub promote_long_age_days: i64,
    /// Default expiry horizon recomputed on tier transitions. long_term has
    /// no expiry.
    pub short_term_expiry_days: i64,
    pub mid_term_expiry_days: i64,
}

/// A config-file policy row; merged over the built-in table.
#[derive(Debug, Deserialize, Clone)]
pub struct PolicyOverride {
    pub tool: String,
    pub category: Option<String>,
    pub tier: Option<String>,
    pub initial_confidence: Option<f64>,
    pub expiry_days: Option<i64>,
    pub memory_enabled: Option<bool>,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            retrieval: RetrievalConfig::default(),
            similarity: SimilarityConfig::default(),
            invalidation: InvalidationConfig::default(),
            compound: CompoundConfig::default(),
            lifecycle: LifecycleConfig::default(),
            policy: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mnemo_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_complexity: 3.0,
            context_similarity: 0.7,
            fuzzy_accept_score: 0.7,
            fuzzy_confidence_factor: 0.8,
            fuzzy_scan_limit: 10,
            fuzzy_metadata_bonus: 0.05,
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            string_floor: 0.6,
            sensitive_score: 0.8,
            array_match_threshold: 0.8,
        }
    }
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            primary_factor: 0.5,
            secondary_factor: 0.7,
            reference_factor: 0.9,
            created_reference_factor: 0.95,
        }
    }
}

impl Default for CompoundConfig {
    fn default() -> Self {
        Self {
            relational_bonus_per_step: 0.5,
            relational_bonus_cap: 2.0,
            long_term_complexity: 12.0,
            mid_term_complexity: 8.0,
            long_term_confidence: 0.9,
            mid_term_confidence: 0.8,
            short_term_confidence: 0.7,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600,
            stats_interval_secs: 300,
            decay_idle_days: 30,
            decay_max_access: 3,
            decay_confidence_floor: 0.3,
            purge_age_days: 180,
            promote_mid_access: 5,
            promote_mid_age_days: 3,
            promote_long_access: 20,
            promote_long_age_days: 30,
            short_term_expiry_days: 7,
            mid_term_expiry_days: 30,
        }
    }
}

/// Returns `~/.mnemo/`
pub fn default_mnemo_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".mnemo")
}

/// Returns the default config file path: `~/.mnemo/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemo_dir().join("config.toml")
}

impl MnemoConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemoConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMO_DB, MNEMO_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMO_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMO_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
