//! Secondary cause sources: generic fallbacks, keyword causes, source
//! affinity and message-shape context.

use anyhow::Result;
use regex::Regex;

use crate::features::FeatureVector;

/// Returned in place of a report when classification itself fails.
pub const UNKNOWN_CAUSE: &str = "Unknown error occurred";
pub const UNKNOWN_RECOMMENDATION: &str = "Review log details and system status";

pub const GENERIC_RECOMMENDATIONS: &[&str] = &[
    "Check system logs for additional context",
    "Verify system resources and dependencies",
    "Review recent changes and deployments",
];

/// Every pair whose keyword appears in the message contributes its cause.
pub const KEYWORD_CAUSES: &[(&str, &str)] = &[
    ("timeout", "Request timeout occurred"),
    ("refused", "Connection refused by target"),
    ("denied", "Access or permission denied"),
    ("crash", "Application crash detected"),
    ("panic", "System panic condition"),
    ("abort", "Operation aborted unexpectedly"),
];

pub struct SourceAffinity {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub causes: &'static [&'static str],
    pub recommendations: &'static [&'static str],
}

/// Checked in order; the first group whose keyword appears in the source or
/// message is the only one that contributes.
pub static SOURCE_AFFINITIES: &[SourceAffinity] = &[
    SourceAffinity {
        name: "auth",
        keywords: &["auth", "login", "user", "session"],
        causes: &["Authentication service issue", "User session problem"],
        recommendations: &[
            "Check authentication service health",
            "Verify user session management",
        ],
    },
    SourceAffinity {
        name: "database",
        keywords: &["db", "sql", "postgres", "mysql", "mongo"],
        causes: &["Database service issue", "Data access problem"],
        recommendations: &["Monitor database performance", "Check database connections"],
    },
    SourceAffinity {
        name: "payment",
        keywords: &["payment", "billing", "transaction", "stripe"],
        causes: &["Payment processing issue", "Transaction failure"],
        recommendations: &["Check payment gateway status", "Verify transaction logs"],
    },
    SourceAffinity {
        name: "api",
        keywords: &["api", "gateway", "proxy", "endpoint"],
        causes: &["API service issue", "Gateway problem"],
        recommendations: &["Check API gateway health", "Verify endpoint availability"],
    },
];

/// Causes for an error-level record that matched no category.
pub fn generic_causes(message: &str) -> Vec<&'static str> {
    let mut causes = Vec::new();
    if message.contains("failed") {
        causes.push("Operation failed to complete");
    }
    if message.contains("exception") {
        causes.push("Unhandled exception occurred");
    }
    if message.contains("error") {
        causes.push("System error detected");
    }
    if causes.is_empty() {
        causes.push("Unexpected system behavior");
    }
    causes
}

pub fn keyword_causes(message: &str) -> impl Iterator<Item = &'static str> + '_ {
    KEYWORD_CAUSES
        .iter()
        .filter(move |(k, _)| message.contains(k))
        .map(|(_, cause)| *cause)
}

/// `message` is expected lower-cased already.
pub fn source_affinity(source: &str, message: &str) -> Option<&'static SourceAffinity> {
    let source = source.to_lowercase();
    SOURCE_AFFINITIES.iter().find(|group| {
        group
            .keywords
            .iter()
            .any(|k| source.contains(k) || message.contains(k))
    })
}

/// Message-shape rules: length extremes, structured payloads, HTTP status
/// codes and network addresses.
pub struct ContextRules {
    http_status: Regex,
    ipv4: Regex,
}

#[derive(Debug, Default, PartialEq)]
pub struct ContextFindings {
    pub causes: Vec<&'static str>,
    pub recommendations: Vec<&'static str>,
}

impl ContextFindings {
    fn push(&mut self, cause: &'static str, recommendation: &'static str) {
        self.causes.push(cause);
        self.recommendations.push(recommendation);
    }
}

impl ContextRules {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_status: Regex::new(r"\b(404|500|503|502|401|403)\b")?,
            ipv4: Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b")?,
        })
    }

    pub fn evaluate(&self, message: &str, features: &FeatureVector) -> ContextFindings {
        let mut found = ContextFindings::default();

        if features.message_length > 1000 {
            found.push(
                "Verbose error message indicates complex issue",
                "Review detailed error context",
            );
        } else if features.message_length < 10 {
            found.push(
                "Minimal error information available",
                "Enable more detailed logging",
            );
        }

        if features.has_special_chars && message.contains(&['[', ']', '{', '}'][..]) {
            found.push(
                "Structured data parsing issue",
                "Verify data format and parsing logic",
            );
        }

        // A status code shadows an address in the same message.
        if features.has_digits {
            if self.http_status.is_match(message) {
                found.push("HTTP status code error", "Check HTTP service and routing");
            } else if self.ipv4.is_match(message) {
                found.push("Network address related issue", "Verify network configuration");
            }
        }

        found
    }
}
