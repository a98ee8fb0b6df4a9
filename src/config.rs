//! TOML configuration for logsleuth.
//!
//! Every section is optional; missing sections and fields fall back to the
//! compiled-in defaults, which carry the calibrated scoring constants.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LOGSLEUTH_CONFIG";

const SYSTEM_CONFIG_PATH: &str = "/etc/logsleuth/logsleuth.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve configuration, in order:
    /// 1. An explicit path (from the CLI); errors here are fatal.
    /// 2. The path in `LOGSLEUTH_CONFIG`.
    /// 3. `/etc/logsleuth/logsleuth.toml`.
    /// 4. Compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "LOGSLEUTH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Outlier model
// ---------------------------------------------------------------------------

/// Outlier ensemble parameters and persistence location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding the persisted forest and scaler blobs.
    pub dir: PathBuf,
    /// Expected outlier fraction; sets the decision threshold at fit time.
    pub contamination: f64,
    pub n_estimators: usize,
    /// Upper bound on the per-tree subsample.
    pub max_samples: usize,
    pub seed: u64,
    /// Write the fitted model to `dir` after the first fit.
    pub persist: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/models"),
            contamination: 0.05,
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
            persist: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Calibration constants for the rule scorer and the combiner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub error_level_score: f64,
    /// Contribution of each matched critical keyword.
    pub critical_keyword_weight: f64,
    pub critical_keyword_threshold: f64,
    pub critical_keyword_base: f64,
    pub critical_keyword_cap: f64,
    pub warn_with_error_score: f64,
    pub long_message_chars: usize,
    pub long_message_score: f64,
    pub frequent_pattern_score: f64,
    pub default_score: f64,
    /// An outlier-only verdict must exceed this score to be promoted.
    pub ml_promotion_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            error_level_score: 0.8,
            critical_keyword_weight: 0.2,
            critical_keyword_threshold: 0.4,
            critical_keyword_base: 0.5,
            critical_keyword_cap: 0.9,
            warn_with_error_score: 0.6,
            long_message_chars: 1000,
            long_message_score: 0.5,
            frequent_pattern_score: 0.7,
            default_score: 0.1,
            ml_promotion_threshold: 0.7,
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Messages longer than this (in chars) are not analyzed; they get fallback values.
    pub max_message_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 1_048_576,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// SQLite database for the analysis history.
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            db_path: PathBuf::from("data/logsleuth.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
