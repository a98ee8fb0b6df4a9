//! Feature extraction: turns a raw log record into a cleaned message and a
//! numeric/boolean feature vector.
//!
//! Extraction never fails a batch. A record whose extraction errors gets a
//! zeroed fallback vector and the batch continues.

pub mod keywords;
pub mod text;

use crate::record::LogRecord;
use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use self::keywords::{
    contains_any, count_present, CRITICAL_KEYWORDS, ERROR_KEYWORDS, ERROR_PATTERN_WEIGHTS,
    SPECIAL_CHARS, STACK_TRACE_MARKERS, WARNING_KEYWORDS,
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("message too large: {len} chars exceeds limit of {max}")]
    MessageTooLarge { len: usize, max: usize },
}

/// Number of features fed to the outlier model.
pub const MODEL_FEATURE_COUNT: usize = 13;

/// Per-record features. Pure function of the record.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub message_length: usize,
    pub word_count: usize,
    pub level_weight: u8,
    pub has_error_keywords: bool,
    pub has_warning_keywords: bool,
    pub has_digits: bool,
    pub has_special_chars: bool,
    pub source_hash: u32,
    pub critical_keyword_count: usize,
    pub error_pattern_score: f64,
    pub stack_trace_indicator: f64,
    pub is_error_level: bool,
    pub message_entropy: f64,

    // Auxiliary signals, not part of the model input.
    pub has_ip_address: bool,
    pub has_timestamp: bool,
    pub uppercase_ratio: f64,
    pub numeric_ratio: f64,
}

impl FeatureVector {
    /// Model input, in fixed column order.
    pub fn to_vector(&self) -> Vec<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        vec![
            self.message_length as f64,
            self.word_count as f64,
            f64::from(self.level_weight),
            flag(self.has_error_keywords),
            flag(self.has_warning_keywords),
            flag(self.has_digits),
            flag(self.has_special_chars),
            f64::from(self.source_hash),
            self.critical_keyword_count as f64,
            self.error_pattern_score,
            self.stack_trace_indicator,
            flag(self.is_error_level),
            self.message_entropy,
        ]
    }
}

/// Extraction output for one record.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedRecord {
    pub cleaned_message: String,
    pub features: FeatureVector,
    pub normalized_timestamp: String,
    /// Dates, times, IPs, e-mails and UUIDs found in the message.
    pub patterns: Vec<String>,
    /// True when extraction failed and the fallback vector was substituted.
    pub degraded: bool,
}

impl ExtractedRecord {
    fn fallback(record: &LogRecord) -> Self {
        Self {
            cleaned_message: record.message().to_string(),
            features: FeatureVector::default(),
            normalized_timestamp: record.timestamp.clone(),
            patterns: Vec::new(),
            degraded: true,
        }
    }
}

/// Feature extractor with its patterns compiled once.
pub struct FeatureExtractor {
    max_message_chars: usize,
    ip_re: Regex,
    time_re: Regex,
    /// Date, time, IPv4, e-mail, UUID; in reporting order.
    common_patterns: Vec<Regex>,
}

impl FeatureExtractor {
    pub fn new(max_message_chars: usize) -> Result<Self> {
        let sources = [
            r"\d{4}-\d{2}-\d{2}",
            r"\d{2}:\d{2}:\d{2}",
            r"\b\d+\.\d+\.\d+\.\d+\b",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b",
            r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
        ];
        let common_patterns = sources
            .iter()
            .map(|s| Regex::new(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            max_message_chars,
            ip_re: Regex::new(r"\b\d+\.\d+\.\d+\.\d+\b")?,
            time_re: Regex::new(r"\d{2}:\d{2}:\d{2}")?,
            common_patterns,
        })
    }

    /// Extract features for one record.
    pub fn extract(&self, record: &LogRecord) -> Result<ExtractedRecord, ExtractError> {
        let message = record.message();
        let len = message.chars().count();
        if len > self.max_message_chars {
            return Err(ExtractError::MessageTooLarge {
                len,
                max: self.max_message_chars,
            });
        }

        let lower = message.to_lowercase();
        let level = record.level();

        let error_pattern_score: f64 = ERROR_PATTERN_WEIGHTS
            .iter()
            .filter(|(k, _)| lower.contains(k))
            .map(|(_, w)| w)
            .sum();
        let stack_markers = count_present(&lower, STACK_TRACE_MARKERS);

        let features = FeatureVector {
            message_length: len,
            word_count: message.split_whitespace().count(),
            level_weight: level.weight(),
            has_error_keywords: contains_any(&lower, ERROR_KEYWORDS),
            has_warning_keywords: contains_any(&lower, WARNING_KEYWORDS),
            has_digits: message.chars().any(char::is_numeric),
            has_special_chars: message.chars().any(|c| SPECIAL_CHARS.contains(c)),
            source_hash: text::source_hash(&record.source),
            critical_keyword_count: count_present(&lower, CRITICAL_KEYWORDS),
            error_pattern_score: error_pattern_score.min(1.0),
            stack_trace_indicator: (stack_markers as f64 / 3.0).min(1.0),
            is_error_level: level.is_error(),
            message_entropy: text::normalized_entropy(message),
            has_ip_address: self.ip_re.is_match(message),
            has_timestamp: self.time_re.is_match(message),
            uppercase_ratio: text::char_ratio(message, char::is_uppercase),
            numeric_ratio: text::char_ratio(message, char::is_numeric),
        };

        let patterns = self
            .common_patterns
            .iter()
            .flat_map(|re| re.find_iter(message).map(|m| m.as_str().to_string()))
            .collect();

        Ok(ExtractedRecord {
            cleaned_message: text::clean_message(message),
            features,
            normalized_timestamp: text::normalize_timestamp(&record.timestamp),
            patterns,
            degraded: false,
        })
    }

    /// Extract a whole batch. Output has the same length and order as the input.
    pub fn extract_batch(&self, records: &[LogRecord]) -> Vec<ExtractedRecord> {
        records
            .iter()
            .map(|r| match self.extract(r) {
                Ok(x) => x,
                Err(e) => {
                    warn!(id = %r.id, error = %e, "feature extraction failed, using fallback");
                    ExtractedRecord::fallback(r)
                }
            })
            .collect()
    }
}
