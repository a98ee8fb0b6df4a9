//! Fixed keyword tables consulted by the feature extractor and the rule scorer.
//!
//! All entries are lower-case; callers match against a lower-cased message.

/// Any of these marks a message as carrying an error keyword.
pub const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "exception",
    "failed",
    "failure",
    "crash",
    "fatal",
    "critical",
    "panic",
    "abort",
    "timeout",
    "refused",
    "denied",
    "null pointer",
    "segmentation fault",
    "out of memory",
    "stack overflow",
];

pub const WARNING_KEYWORDS: &[&str] = &[
    "warning",
    "warn",
    "deprecated",
    "slow",
    "retry",
    "fallback",
    "degraded",
    "limited",
    "throttled",
    "temporary",
    "disabled",
];

/// Counted (each at most once) into `critical_keyword_count`.
pub const CRITICAL_KEYWORDS: &[&str] = &[
    "panic",
    "crash",
    "segmentation fault",
    "out of memory",
    "connection refused",
    "timeout",
    "failed",
    "exception",
    "critical",
    "fatal",
    "abort",
    "denied",
    "null pointer",
    "stack overflow",
    "access denied",
    "permission denied",
];

/// Weighted into the critical-keyword rule; a narrower set than
/// [`CRITICAL_KEYWORDS`].
pub const RULE_CRITICAL_KEYWORDS: &[&str] = &[
    "panic",
    "crash",
    "segmentation fault",
    "out of memory",
    "connection refused",
    "timeout",
    "failed",
    "exception",
    "critical",
    "fatal",
    "abort",
    "denied",
];

/// Per-keyword weights summed into `error_pattern_score`.
pub const ERROR_PATTERN_WEIGHTS: &[(&str, f64)] = &[
    ("connection", 0.3),
    ("timeout", 0.4),
    ("failed", 0.2),
    ("error", 0.1),
    ("exception", 0.3),
    ("crash", 0.5),
    ("panic", 0.6),
    ("fatal", 0.5),
    ("critical", 0.4),
];

pub const STACK_TRACE_MARKERS: &[&str] = &[
    "at ",
    "in ",
    "line ",
    "file ",
    ".java:",
    ".py:",
    ".cpp:",
    "stacktrace",
    "traceback",
    "caused by",
];

/// Substrings the rule scorer treats as well-known failure signatures.
pub const FREQUENT_ERROR_PATTERNS: &[&str] = &[
    "connection refused",
    "timeout",
    "out of memory",
    "segmentation fault",
    "null pointer",
    "stack overflow",
    "access denied",
    "permission denied",
    "file not found",
    "network unreachable",
];

pub const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|k| haystack.contains(k))
}

pub fn count_present(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().filter(|k| haystack.contains(*k)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_lowercase() {
        for table in [
            ERROR_KEYWORDS,
            WARNING_KEYWORDS,
            CRITICAL_KEYWORDS,
            RULE_CRITICAL_KEYWORDS,
            STACK_TRACE_MARKERS,
            FREQUENT_ERROR_PATTERNS,
        ] {
            for k in table {
                assert_eq!(*k, k.to_lowercase());
            }
        }
    }

    #[test]
    fn test_count_present_counts_each_once() {
        assert_eq!(count_present("timeout timeout timeout", CRITICAL_KEYWORDS), 1);
        // "access denied" also contains "denied"
        assert_eq!(count_present("access denied", CRITICAL_KEYWORDS), 2);
    }
}
