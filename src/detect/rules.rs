//! Deterministic rule scorer: a decision list evaluated in priority order,
//! first match wins.

use crate::config::ScoringConfig;
use crate::detect::DetectionResult;
use crate::features::keywords::{
    contains_any, count_present, FREQUENT_ERROR_PATTERNS, RULE_CRITICAL_KEYWORDS,
};
use crate::features::ExtractedRecord;
use crate::record::{Level, LogRecord};

/// Which rule produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleHit {
    ErrorLevel,
    CriticalKeywords,
    WarnWithErrorKeyword,
    LongMessage,
    FrequentErrorPattern,
    Default,
}

pub struct RuleScorer {
    cfg: ScoringConfig,
}

impl RuleScorer {
    pub fn new(cfg: ScoringConfig) -> Self {
        Self { cfg }
    }

    pub fn evaluate(
        &self,
        record: &LogRecord,
        extracted: &ExtractedRecord,
    ) -> (RuleHit, DetectionResult) {
        let cfg = &self.cfg;
        let level = record.level();
        let message = record.message().to_lowercase();
        let features = &extracted.features;

        if level.is_error() {
            return (RuleHit::ErrorLevel, DetectionResult::new(true, cfg.error_level_score));
        }

        let weighted =
            count_present(&message, RULE_CRITICAL_KEYWORDS) as f64 * cfg.critical_keyword_weight;
        // Tolerance keeps two 0.2 hits from missing a 0.4 threshold on rounding.
        if weighted + 1e-9 >= cfg.critical_keyword_threshold {
            let score = (cfg.critical_keyword_base + weighted).min(cfg.critical_keyword_cap);
            return (RuleHit::CriticalKeywords, DetectionResult::new(true, score));
        }

        if level == Level::Warn && features.has_error_keywords {
            return (
                RuleHit::WarnWithErrorKeyword,
                DetectionResult::new(true, cfg.warn_with_error_score),
            );
        }

        if features.message_length > cfg.long_message_chars {
            return (RuleHit::LongMessage, DetectionResult::new(true, cfg.long_message_score));
        }

        if contains_any(&message, FREQUENT_ERROR_PATTERNS) {
            return (
                RuleHit::FrequentErrorPattern,
                DetectionResult::new(true, cfg.frequent_pattern_score),
            );
        }

        (RuleHit::Default, DetectionResult::new(false, cfg.default_score))
    }

    pub fn score(&self, record: &LogRecord, extracted: &ExtractedRecord) -> DetectionResult {
        self.evaluate(record, extracted).1
    }

    /// Score a batch; `records` and `extracted` are parallel slices.
    pub fn score_batch(
        &self,
        records: &[LogRecord],
        extracted: &[ExtractedRecord],
    ) -> Vec<DetectionResult> {
        records
            .iter()
            .zip(extracted)
            .map(|(r, x)| self.score(r, x))
            .collect()
    }
}
