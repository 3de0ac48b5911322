// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Credit Cortex Configuration
//
// One YAML document with a section per component:
// - vectorizer: normalization ceilings and embedding block width
// - memory: store backend and over-fetch factor for label filtering
// - anomaly: hard-rule ceiling and distance thresholds
// - decision: neighbor count, vote smoothing and recommendation thresholds
// - embedding: text embedding provider
//
// Every constant is versioned with the file; nothing is fit from data.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::vectorizer::PROFILE_FEATURES;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub vectorizer: VectorizerConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub anomaly: AnomalyConfig,

    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Fixed normalization policy: each field is divided by its ceiling and clamped to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    pub income_ceiling: f64,
    pub expenses_ceiling: f64,
    pub employment_length_ceiling: f64,
    pub loan_amount_ceiling: f64,
    pub loan_term_ceiling: f64,

    /// Width of the auxiliary text-embedding block
    pub embedding_dimension: usize,
}

impl VectorizerConfig {
    /// Total feature vector length; the store must be created with this dimension.
    pub fn dimension(&self) -> usize {
        PROFILE_FEATURES + self.embedding_dimension
    }
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            income_ceiling: 20_000.0,
            expenses_ceiling: 10_000.0,
            employment_length_ceiling: 20.0,
            loan_amount_ceiling: 50_000.0,
            loan_term_ceiling: 60.0,
            embedding_dimension: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Candidates fetched per requested result when the store cannot filter natively
    pub over_fetch_factor: usize,

    pub store: StoreConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            over_fetch_factor: 4,
            store: StoreConfig::InMemory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    InMemory,
    Qdrant {
        url: String,
        #[serde(default = "default_collection")]
        collection: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Years; anything above is flagged
    pub max_employment_length: f64,

    /// Nearest-neighbor distance above which the profile is an outlier
    pub outlier_distance: f64,

    /// Distance below which a labeled fraud case counts as a match
    pub fraud_distance: f64,

    pub fraud_label: String,
    pub fraud_neighbors: usize,

    /// Candidate pool searched before filtering to fraud-labeled cases
    pub fraud_search_width: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            max_employment_length: 60.0,
            outlier_distance: 0.35,
            fraud_distance: 0.15,
            fraud_label: "fraud".to_string(),
            fraud_neighbors: 1,
            fraud_search_width: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// k for neighbor retrieval
    pub neighbors: usize,

    /// Added to every distance before inverting it into a vote weight
    pub epsilon: f64,

    /// Approval score strictly above this approves
    pub approve_above: f64,

    /// Approval score strictly below this declines
    pub decline_below: f64,

    /// Absolute income difference under which a precedent reports "Similar Income"
    pub similar_income_delta: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            neighbors: 5,
            epsilon: 0.05,
            approve_above: 0.6,
            decline_below: 0.4,
            similar_income_delta: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    /// Zero-filled auxiliary block
    #[default]
    None,
    Hash,
    Ollama { endpoint: String, model: String },
}

fn default_collection() -> String {
    crate::infrastructure::qdrant_repository::DEFAULT_COLLECTION.to_string()
}

impl CortexConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CREDIT_CORTEX_CONFIG environment variable
    /// 2. ./credit-cortex.yaml (working directory)
    /// 3. ~/.credit-cortex/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CREDIT_CORTEX_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./credit-cortex.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".credit-cortex").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = explicit_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CREDIT_CORTEX_QDRANT_URL") {
            tracing::info!("Environment override: CREDIT_CORTEX_QDRANT_URL={}", url);
            let collection = match &self.memory.store {
                StoreConfig::Qdrant { collection, .. } => collection.clone(),
                StoreConfig::InMemory => default_collection(),
            };
            self.memory.store = StoreConfig::Qdrant { url, collection };
        }

        if let Ok(val) = std::env::var("CREDIT_CORTEX_NEIGHBORS") {
            match val.parse::<usize>() {
                Ok(k) => {
                    tracing::info!("Environment override: CREDIT_CORTEX_NEIGHBORS={}", k);
                    self.decision.neighbors = k;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for CREDIT_CORTEX_NEIGHBORS: '{}'. Expected a positive integer. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let v = &self.vectorizer;
        for (name, ceiling) in [
            ("income_ceiling", v.income_ceiling),
            ("expenses_ceiling", v.expenses_ceiling),
            ("employment_length_ceiling", v.employment_length_ceiling),
            ("loan_amount_ceiling", v.loan_amount_ceiling),
            ("loan_term_ceiling", v.loan_term_ceiling),
        ] {
            if !(ceiling > 0.0) {
                anyhow::bail!("vectorizer.{} must be positive, got {}", name, ceiling);
            }
        }

        if self.memory.over_fetch_factor == 0 {
            anyhow::bail!("memory.over_fetch_factor must be at least 1");
        }

        if let StoreConfig::Qdrant { url, collection } = &self.memory.store {
            if url.is_empty() {
                anyhow::bail!("memory.store.url cannot be empty");
            }
            if collection.is_empty() {
                anyhow::bail!("memory.store.collection cannot be empty");
            }
        }

        let d = &self.decision;
        if d.neighbors == 0 {
            anyhow::bail!("decision.neighbors must be at least 1");
        }
        if !(d.epsilon > 0.0) {
            anyhow::bail!("decision.epsilon must be positive, got {}", d.epsilon);
        }
        if !(0.0..=1.0).contains(&d.decline_below) || !(0.0..=1.0).contains(&d.approve_above) {
            anyhow::bail!("decision thresholds must lie in [0, 1]");
        }
        if d.decline_below > d.approve_above {
            anyhow::bail!(
                "decision.decline_below ({}) cannot exceed decision.approve_above ({})",
                d.decline_below,
                d.approve_above
            );
        }

        let a = &self.anomaly;
        for (name, distance) in [
            ("outlier_distance", a.outlier_distance),
            ("fraud_distance", a.fraud_distance),
        ] {
            if !(0.0..=1.0).contains(&distance) {
                anyhow::bail!("anomaly.{} must lie in [0, 1], got {}", name, distance);
            }
        }
        if !(a.max_employment_length >= 0.0) {
            anyhow::bail!(
                "anomaly.max_employment_length must be non-negative, got {}",
                a.max_employment_length
            );
        }
        if a.fraud_label.is_empty() {
            anyhow::bail!("anomaly.fraud_label cannot be empty");
        }
        if a.fraud_neighbors == 0 || a.fraud_search_width < a.fraud_neighbors {
            anyhow::bail!("anomaly.fraud_search_width must be at least anomaly.fraud_neighbors (>= 1)");
        }

        if let EmbeddingConfig::Ollama { endpoint, model } = &self.embedding {
            if endpoint.is_empty() || model.is_empty() {
                anyhow::bail!("embedding endpoint and model cannot be empty for the ollama provider");
            }
        }

        Ok(())
    }
}
