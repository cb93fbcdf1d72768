//! Configuration system for vigil.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{VigilError, VigilResult};

/// Delivery budget defaults.
///
/// The hourly and daily limits are the fallbacks used when the active persona
/// does not carry its own caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    /// Deliveries allowed per hourly window (default: 8).
    pub hourly_limit: u32,
    /// Deliveries allowed per daily window (default: 30).
    pub daily_limit: u32,
    /// Minimum seconds between two deliveries (default: 120).
    pub min_gap_secs: i64,
    /// Hourly usage ratio above which only `timely` signals get through (default: 0.8).
    pub preservation_ratio: f64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            hourly_limit: 8,
            daily_limit: 30,
            min_gap_secs: 120,
            preservation_ratio: 0.8,
        }
    }
}

/// Weights of the four SIS sub-scores. They should sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub relevance_weight: f64,
    pub priority_weight: f64,
    pub recency_weight: f64,
    pub history_weight: f64,
    /// Recency half-life in hours (default: 24).
    pub recency_half_life_hours: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 0.35,
            priority_weight: 0.30,
            recency_weight: 0.15,
            history_weight: 0.20,
            recency_half_life_hours: 24.0,
        }
    }
}

/// Behavior learning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// EMA weight given to each new observation (default: 0.1).
    pub learning_rate: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self { learning_rate: 0.1 }
    }
}

/// Retention caps for the persisted collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Delivered signals kept (default: 200).
    pub max_signals: usize,
    /// Delivered signals kept when the store is out of space (default: 100).
    pub pressure_signals: usize,
    /// Deferred signals kept (default: 100).
    pub max_queue: usize,
    /// Deferred signals kept when the store is out of space (default: 50).
    pub pressure_queue: usize,
    /// Alert rules kept when the store is out of space (default: 10).
    pub pressure_rules: usize,
    /// Clusters kept (default: 100).
    pub max_clusters: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_signals: 200,
            pressure_signals: 100,
            max_queue: 100,
            pressure_queue: 50,
            pressure_rules: 10,
            max_clusters: 100,
        }
    }
}

/// Cluster grouping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Length of a cluster's time window in hours (default: 4).
    pub window_hours: i64,
    /// Maximum members per cluster (default: 5).
    pub max_members: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            window_hours: 4,
            max_members: 5,
        }
    }
}

/// Where the durable store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path. `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    /// Per-value byte limit enforced by the store (default: none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value_bytes: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let vigil_dir = dirs::home_dir()
            .map(|h| h.join(".vigil"))
            .unwrap_or_else(|| PathBuf::from(".vigil"));

        Self {
            db_path: Some(vigil_dir.join("vigil.db")),
            max_value_bytes: None,
        }
    }
}

/// Main vigil configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub fatigue: FatigueConfig,
    pub scoring: ScoringConfig,
    pub learning: LearningConfig,
    pub retention: RetentionConfig,
    pub clustering: ClusteringConfig,
    pub storage: StorageConfig,
}

impl VigilConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> VigilResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| VigilError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| VigilError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| VigilError::Configuration(e.to_string())),
            _ => Err(VigilError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `VIGIL_HOURLY_LIMIT`, `VIGIL_DAILY_LIMIT`, `VIGIL_MIN_GAP_SECS`
    /// - `VIGIL_LEARNING_RATE`
    /// - `VIGIL_MAX_SIGNALS`
    /// - `VIGIL_DB_PATH` (`:memory:` keeps state in memory)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(limit) = env_parse("VIGIL_HOURLY_LIMIT") {
            config.fatigue.hourly_limit = limit;
        }
        if let Some(limit) = env_parse("VIGIL_DAILY_LIMIT") {
            config.fatigue.daily_limit = limit;
        }
        if let Some(secs) = env_parse("VIGIL_MIN_GAP_SECS") {
            config.fatigue.min_gap_secs = secs;
        }
        if let Some(rate) = env_parse::<f64>("VIGIL_LEARNING_RATE") {
            config.learning.learning_rate = rate.clamp(0.0, 1.0);
        }
        if let Some(max) = env_parse("VIGIL_MAX_SIGNALS") {
            config.retention.max_signals = max;
        }
        if let Ok(path) = std::env::var("VIGIL_DB_PATH") {
            config.storage.db_path = if path == ":memory:" {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> VigilConfigBuilder {
        VigilConfigBuilder::default()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Builder for VigilConfig.
#[derive(Default)]
pub struct VigilConfigBuilder {
    config: VigilConfig,
}

impl VigilConfigBuilder {
    /// Set the fatigue budget.
    pub fn fatigue(mut self, config: FatigueConfig) -> Self {
        self.config.fatigue = config;
        self
    }

    /// Set the scoring weights.
    pub fn scoring(mut self, config: ScoringConfig) -> Self {
        self.config.scoring = config;
        self
    }

    /// Set the learning settings.
    pub fn learning(mut self, config: LearningConfig) -> Self {
        self.config.learning = config;
        self
    }

    /// Set the retention caps.
    pub fn retention(mut self, config: RetentionConfig) -> Self {
        self.config.retention = config;
        self
    }

    /// Set the clustering settings.
    pub fn clustering(mut self, config: ClusteringConfig) -> Self {
        self.config.clustering = config;
        self
    }

    /// Set the SQLite database path.
    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.storage.db_path = Some(path);
        self
    }

    /// Keep all state in memory.
    pub fn in_memory(mut self) -> Self {
        self.config.storage.db_path = None;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> VigilConfig {
        self.config
    }
}
