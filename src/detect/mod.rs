//! Hybrid anomaly detection: rule scoring, the outlier ensemble, and their
//! reconciliation.

pub mod combine;
pub mod engine;
pub mod forest;
pub mod outlier;
pub mod rules;
pub mod scaler;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("insufficient training data: need {needed} samples, have {have}")]
    InsufficientSamples { needed: usize, have: usize },

    #[error("feature width mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("non-finite feature value in training batch")]
    NonFinite,

    #[error("outlier model lock poisoned")]
    LockPoisoned,

    #[error("model persistence failed: {0}")]
    Persist(#[from] std::io::Error),

    #[error("model blob could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Per-record verdict. `score` is in [0, 1], higher is more anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_anomaly: bool,
    pub score: f64,
}

impl DetectionResult {
    pub fn new(is_anomaly: bool, score: f64) -> Self {
        Self { is_anomaly, score }
    }

    /// The "no anomaly" default substituted when the outlier model cannot score.
    pub fn normal() -> Self {
        Self {
            is_anomaly: false,
            score: 0.0,
        }
    }
}
