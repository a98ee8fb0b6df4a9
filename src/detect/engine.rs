use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::detect::combine::Combiner;
use crate::detect::outlier::{ModelStatus, OutlierModel};
use crate::detect::rules::RuleScorer;
use crate::detect::DetectError;
use crate::features::FeatureExtractor;
use crate::record::LogRecord;
use crate::rootcause::{RootCauseClassifier, RootCauseReport};

/// Final verdict for one input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordAnalysis {
    pub log_id: String,
    pub is_anomaly: bool,
    pub score: f64,
    pub root_causes: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub anomalies: usize,
    pub max_score: f64,
    /// Whether the outlier model had a fitted state after scoring this batch.
    pub model_fitted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnalysis {
    pub results: Vec<RecordAnalysis>,
    pub summary: BatchSummary,
}

/// The whole detection pipeline: extract, score twice, combine, classify.
pub struct AnalysisEngine {
    extractor: FeatureExtractor,
    rules: RuleScorer,
    outlier: OutlierModel,
    combiner: Combiner,
    classifier: RootCauseClassifier,
}

impl AnalysisEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_model(config, OutlierModel::open(&config.model))
    }

    /// Build around an already constructed outlier model.
    pub fn with_model(config: &Config, outlier: OutlierModel) -> Result<Self> {
        let max_chars = config.limits.max_message_chars;
        Ok(Self {
            extractor: FeatureExtractor::new(max_chars).context("building feature extractor")?,
            rules: RuleScorer::new(config.scoring.clone()),
            outlier,
            combiner: Combiner::new(config.scoring.ml_promotion_threshold),
            classifier: RootCauseClassifier::new(max_chars)
                .context("compiling root-cause categories")?,
        })
    }

    /// Analyze a batch. Results have the length and order of `records`.
    pub fn analyze(&self, records: &[LogRecord], with_root_cause: bool) -> BatchAnalysis {
        let extracted = self.extractor.extract_batch(records);

        let rule_results = self.rules.score_batch(records, &extracted);
        let rows: Vec<Vec<f64>> = extracted.iter().map(|x| x.features.to_vector()).collect();
        let ml_results = self.outlier.score(&rows);
        let combined = self.combiner.combine_batch(&rule_results, &ml_results);

        let results: Vec<RecordAnalysis> = records
            .iter()
            .zip(&extracted)
            .zip(combined)
            .map(|((record, x), verdict)| {
                let report = if with_root_cause {
                    self.classifier.analyze(record, x)
                } else {
                    RootCauseReport::default()
                };
                RecordAnalysis {
                    log_id: record.id.clone(),
                    is_anomaly: verdict.is_anomaly,
                    score: verdict.score,
                    root_causes: report.root_causes,
                    recommendations: report.recommendations,
                }
            })
            .collect();

        let summary = BatchSummary {
            total: results.len(),
            anomalies: results.iter().filter(|r| r.is_anomaly).count(),
            max_score: results.iter().map(|r| r.score).fold(0.0, f64::max),
            model_fitted: self.outlier.is_fitted(),
        };
        info!(
            batch_size = summary.total,
            anomalies = summary.anomalies,
            max_score = summary.max_score,
            "batch analyzed"
        );

        BatchAnalysis { results, summary }
    }

    /// Run `analyze` on the blocking pool.
    pub async fn analyze_blocking(
        self: Arc<Self>,
        records: Vec<LogRecord>,
        with_root_cause: bool,
    ) -> Result<BatchAnalysis> {
        tokio::task::spawn_blocking(move || self.analyze(&records, with_root_cause))
            .await
            .context("analysis task panicked")
    }

    pub fn model_status(&self) -> ModelStatus {
        self.outlier.status()
    }

    pub fn reset_model(&self) -> Result<(), DetectError> {
        debug!("resetting outlier model");
        self.outlier.reset()
    }
}
