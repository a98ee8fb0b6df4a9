//! Root-cause classification: ranks failure categories for an error-worthy
//! record and assembles deduplicated causes and recommendations.

pub mod categories;
pub mod context;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::features::ExtractedRecord;
use crate::record::LogRecord;

use self::categories::{compile_all, rank, CompiledCategory};
use self::context::{
    generic_causes, keyword_causes, source_affinity, ContextRules, GENERIC_RECOMMENDATIONS,
    UNKNOWN_CAUSE, UNKNOWN_RECOMMENDATION,
};

/// Maximum entries kept in each list of a report.
pub const MAX_REPORT_ENTRIES: usize = 4;

#[derive(Debug, Error)]
pub enum RootCauseError {
    #[error("message too large for classification: {len} chars exceeds limit of {max}")]
    MessageTooLarge { len: usize, max: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootCauseReport {
    pub root_causes: Vec<String>,
    pub recommendations: Vec<String>,
}

impl RootCauseReport {
    /// The single generic pair used when classification fails.
    pub fn unknown() -> Self {
        Self {
            root_causes: vec![UNKNOWN_CAUSE.to_string()],
            recommendations: vec![UNKNOWN_RECOMMENDATION.to_string()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root_causes.is_empty() && self.recommendations.is_empty()
    }
}

/// Ordered, first-seen-wins accumulator capped when finished.
#[derive(Default)]
struct Collector(Vec<&'static str>);

impl Collector {
    fn extend<I: IntoIterator<Item = &'static str>>(&mut self, items: I) {
        for item in items {
            if !self.0.contains(&item) {
                self.0.push(item);
            }
        }
    }

    fn finish(self) -> Vec<String> {
        self.0
            .into_iter()
            .take(MAX_REPORT_ENTRIES)
            .map(str::to_string)
            .collect()
    }
}

pub struct RootCauseClassifier {
    categories: Vec<CompiledCategory>,
    context: ContextRules,
    max_message_chars: usize,
}

impl RootCauseClassifier {
    pub fn new(max_message_chars: usize) -> Result<Self> {
        Ok(Self {
            categories: compile_all()?,
            context: ContextRules::new()?,
            max_message_chars,
        })
    }

    /// Classify one record. Never fails; a classification error yields the
    /// generic unknown pair.
    pub fn analyze(&self, record: &LogRecord, extracted: &ExtractedRecord) -> RootCauseReport {
        match self.try_analyze(record, extracted) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    id = %record.id,
                    error = %e,
                    "root-cause analysis failed, using generic cause"
                );
                RootCauseReport::unknown()
            }
        }
    }

    pub fn try_analyze(
        &self,
        record: &LogRecord,
        extracted: &ExtractedRecord,
    ) -> Result<RootCauseReport, RootCauseError> {
        let raw = record.message();
        let len = raw.chars().count();
        if len > self.max_message_chars {
            return Err(RootCauseError::MessageTooLarge {
                len,
                max: self.max_message_chars,
            });
        }

        let features = &extracted.features;
        let error_level = record.level().is_error();
        if !error_level && !features.has_error_keywords {
            return Ok(RootCauseReport::default());
        }

        let message = raw.to_lowercase();
        let mut causes = Collector::default();
        let mut recommendations = Collector::default();

        for m in rank(&self.categories, &message) {
            let n = m.take();
            causes.extend(m.def.root_causes.iter().take(n).copied());
            recommendations.extend(m.def.recommendations.iter().take(n).copied());
        }

        if error_level && causes.0.is_empty() {
            causes.extend(generic_causes(&message));
            recommendations.extend(GENERIC_RECOMMENDATIONS.iter().copied());
        }

        if features.has_error_keywords {
            causes.extend(keyword_causes(&message));
        }

        if let Some(group) = source_affinity(&record.source, &message) {
            causes.extend(group.causes.iter().copied());
            recommendations.extend(group.recommendations.iter().copied());
        }

        let found = self.context.evaluate(&message, features);
        causes.extend(found.causes);
        recommendations.extend(found.recommendations);

        Ok(RootCauseReport {
            root_causes: causes.finish(),
            recommendations: recommendations.finish(),
        })
    }
}
