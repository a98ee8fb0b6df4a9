//! End-to-end behavior of the detection pipeline and root-cause classifier.

use logsleuth::config::{Config, ScoringConfig};
use logsleuth::detect::combine::Combiner;
use logsleuth::detect::engine::AnalysisEngine;
use logsleuth::detect::forest::ForestParams;
use logsleuth::detect::outlier::OutlierModel;
use logsleuth::detect::rules::RuleScorer;
use logsleuth::detect::DetectionResult;
use logsleuth::features::FeatureExtractor;
use logsleuth::record::LogRecord;
use logsleuth::rootcause::{RootCauseClassifier, MAX_REPORT_ENTRIES};
use proptest::prelude::*;

const LIMIT: usize = 1_048_576;

fn engine() -> AnalysisEngine {
    let config = Config::default();
    let model = OutlierModel::new(ForestParams::from(&config.model), None);
    AnalysisEngine::with_model(&config, model).unwrap()
}

fn rule_verdict(level: &str, message: &str) -> DetectionResult {
    let rec = LogRecord::new("t", level, message, "svc");
    let x = FeatureExtractor::new(LIMIT).unwrap().extract(&rec).unwrap();
    RuleScorer::new(ScoringConfig::default()).score(&rec, &x)
}

#[test]
fn scenario_database_timeout() {
    let message = "Database connection failed: Connection timeout after 30 seconds";
    let verdict = rule_verdict("ERROR", message);
    assert!(verdict.is_anomaly);
    assert_eq!(verdict.score, 0.8);

    let rec = LogRecord::new("t", "ERROR", message, "db-service");
    let x = FeatureExtractor::new(LIMIT).unwrap().extract(&rec).unwrap();
    let report = RootCauseClassifier::new(LIMIT).unwrap().analyze(&rec, &x);
    assert!(report
        .root_causes
        .iter()
        .any(|c| c == "Database connection timeout"));
}

#[test]
fn scenario_empty_info_message() {
    let verdict = rule_verdict("INFO", "");
    assert!(!verdict.is_anomaly);
    assert_eq!(verdict.score, 0.1);

    let rec = LogRecord::new("t", "INFO", "", "web");
    let x = FeatureExtractor::new(LIMIT).unwrap().extract(&rec).unwrap();
    let report = RootCauseClassifier::new(LIMIT).unwrap().analyze(&rec, &x);
    assert!(report.root_causes.is_empty());
    assert!(report.recommendations.is_empty());
}

#[test]
fn scenario_two_critical_keywords() {
    let verdict = rule_verdict("INFO", "scheduler panic caused a crash of worker 3");
    assert!(verdict.is_anomaly);
    assert!((verdict.score - 0.9).abs() < 1e-9);
}

#[test]
fn scenario_long_info_message() {
    let message = "x".repeat(1500);
    let verdict = rule_verdict("INFO", &message);
    assert!(verdict.is_anomaly);
    assert_eq!(verdict.score, 0.5);
}

#[test]
fn scenario_confident_ml_promotes() {
    let out = Combiner::default().combine(
        DetectionResult::new(false, 0.1),
        DetectionResult::new(true, 0.85),
    );
    assert_eq!(out, DetectionResult::new(true, 0.85));
}

#[test]
fn scenario_weak_ml_does_not_promote() {
    let out = Combiner::default().combine(
        DetectionResult::new(false, 0.1),
        DetectionResult::new(true, 0.5),
    );
    assert_eq!(out, DetectionResult::new(false, 0.1));
}

#[test]
fn single_record_batch_uses_rules_only() {
    // One row cannot fit the outlier model; the rule verdict stands alone.
    let engine = engine();
    let out = engine.analyze(&[LogRecord::new("1", "INFO", "all good here", "web")], true);
    assert_eq!(out.results.len(), 1);
    assert!(!out.results[0].is_anomaly);
    // min(rule 0.1, default ml 0.0)
    assert_eq!(out.results[0].score, 0.0);
    assert!(!out.summary.model_fitted);
}

#[test]
fn oversized_record_degrades_without_failing_the_batch() {
    let mut config = Config::default();
    config.limits.max_message_chars = 64;
    let model = OutlierModel::new(ForestParams::from(&config.model), None);
    let engine = AnalysisEngine::with_model(&config, model).unwrap();

    let records = vec![
        LogRecord::new("big", "ERROR", &"connection refused ".repeat(10), "api"),
        LogRecord::new("ok", "INFO", "heartbeat", "web"),
    ];
    let out = engine.analyze(&records, true);
    assert_eq!(out.results.len(), 2);
    // Level still drives the rule verdict; classification degrades to the generic pair.
    assert!(out.results[0].is_anomaly);
    assert_eq!(out.results[0].root_causes, vec!["Unknown error occurred"]);
    assert_eq!(
        out.results[0].recommendations,
        vec!["Review log details and system status"]
    );
}

fn level_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "FATAL", "CRITICAL", "TRACE", "",
    ])
    .prop_map(str::to_string)
}

fn record_strategy() -> impl Strategy<Value = LogRecord> {
    (
        "[a-z0-9-]{1,8}",
        level_strategy(),
        "[ -~]{0,120}",
        prop::sample::select(vec!["web", "auth-svc", "db", "payment", "api-gw", "batch"]),
    )
        .prop_map(|(id, level, message, source)| LogRecord::new(&id, &level, &message, source))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn error_levels_always_flag(level in prop::sample::select(vec!["ERROR", "FATAL", "CRITICAL", "error"]), message in ".{0,200}") {
        let verdict = rule_verdict(level, &message);
        prop_assert!(verdict.is_anomaly);
        prop_assert!(verdict.score >= 0.8);
    }

    #[test]
    fn results_match_input_length_and_order(records in prop::collection::vec(record_strategy(), 0..24)) {
        let out = engine().analyze(&records, true);
        prop_assert_eq!(out.results.len(), records.len());
        for (result, record) in out.results.iter().zip(&records) {
            prop_assert_eq!(&result.log_id, &record.id);
            prop_assert!((0.0..=1.0).contains(&result.score));
        }
    }

    #[test]
    fn reports_are_deduplicated_and_capped(records in prop::collection::vec(record_strategy(), 1..16)) {
        let out = engine().analyze(&records, true);
        for result in &out.results {
            for list in [&result.root_causes, &result.recommendations] {
                prop_assert!(list.len() <= MAX_REPORT_ENTRIES);
                let mut unique = list.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), list.len());
            }
        }
    }

    #[test]
    fn combiner_is_deterministic(
        ra in any::<bool>(), rs in 0.0f64..=1.0,
        ma in any::<bool>(), ms in 0.0f64..=1.0,
    ) {
        let c = Combiner::default();
        let rule = DetectionResult::new(ra, rs);
        let ml = DetectionResult::new(ma, ms);
        let first = c.combine(rule, ml);
        prop_assert_eq!(c.combine(rule, ml), first);
        if ra {
            prop_assert!(first.is_anomaly);
        }
    }
}
