//! Text helpers used by the feature extractor.

use chrono::{NaiveDateTime, Timelike};
use std::collections::HashMap;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Collapse runs of whitespace to a single space, trim, and drop control characters.
pub fn clean_message(message: &str) -> String {
    message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Shannon entropy (bits) of the character distribution, divided by 5 and capped at 1.
pub fn normalized_entropy(message: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in message.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let entropy: f64 = counts
        .values()
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum();

    (entropy / 5.0).min(1.0)
}

/// Fraction of characters matching `pred`; 0 for an empty message.
pub fn char_ratio(message: &str, pred: impl Fn(char) -> bool) -> f64 {
    let total = message.chars().count();
    if total == 0 {
        return 0.0;
    }
    message.chars().filter(|&c| pred(c)).count() as f64 / total as f64
}

/// Stable 64-bit FNV-1a, reduced to a weak categorical signal in `0..1000`.
pub fn source_hash(source: &str) -> u32 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in source.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % 1000) as u32
}

/// Re-render a recognized timestamp as ISO-8601; unrecognized input comes back unchanged.
///
/// Fractions are microsecond precision and always six digits; a zero
/// fraction is omitted.
pub fn normalize_timestamp(raw: &str) -> String {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| {
            let fmt = if dt.nanosecond() / 1_000 != 0 {
                "%Y-%m-%dT%H:%M:%S%.6f"
            } else {
                "%Y-%m-%dT%H:%M:%S"
            };
            dt.format(fmt).to_string()
        })
        .unwrap_or_else(|| raw.to_string())
}
