//! Merge rule and outlier verdicts index by index.
//!
//! Rule verdicts always win. An outlier-only verdict promotes a record only
//! when its own score clears the promotion threshold.

use crate::detect::DetectionResult;

#[derive(Debug, Clone, Copy)]
pub struct Combiner {
    promotion_threshold: f64,
}

impl Combiner {
    pub fn new(promotion_threshold: f64) -> Self {
        Self { promotion_threshold }
    }

    pub fn combine(&self, rule: DetectionResult, ml: DetectionResult) -> DetectionResult {
        if rule.is_anomaly {
            DetectionResult::new(true, rule.score.max(ml.score))
        } else if ml.is_anomaly && ml.score > self.promotion_threshold {
            DetectionResult::new(true, ml.score)
        } else {
            DetectionResult::new(false, rule.score.min(ml.score))
        }
    }

    /// Output has the length of `rule`; a missing outlier verdict counts as normal.
    pub fn combine_batch(
        &self,
        rule: &[DetectionResult],
        ml: &[DetectionResult],
    ) -> Vec<DetectionResult> {
        rule.iter()
            .enumerate()
            .map(|(i, r)| {
                let m = ml.get(i).copied().unwrap_or_else(DetectionResult::normal);
                self.combine(*r, m)
            })
            .collect()
    }
}

impl Default for Combiner {
    fn default() -> Self {
        Self::new(0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(a: bool, s: f64) -> DetectionResult {
        DetectionResult::new(a, s)
    }

    #[test]
    fn test_rule_anomaly_takes_max() {
        let c = Combiner::default();
        assert_eq!(c.combine(r(true, 0.8), r(false, 0.3)), r(true, 0.8));
        assert_eq!(c.combine(r(true, 0.6), r(true, 0.95)), r(true, 0.95));
    }

    #[test]
    fn test_confident_ml_promotes() {
        let c = Combiner::default();
        assert_eq!(c.combine(r(false, 0.1), r(true, 0.85)), r(true, 0.85));
    }

    #[test]
    fn test_weak_ml_does_not_promote() {
        let c = Combiner::default();
        assert_eq!(c.combine(r(false, 0.1), r(true, 0.5)), r(false, 0.1));
        // Exactly at the threshold is not enough.
        assert_eq!(c.combine(r(false, 0.1), r(true, 0.7)), r(false, 0.1));
    }

    #[test]
    fn test_both_normal_takes_min() {
        let c = Combiner::default();
        assert_eq!(c.combine(r(false, 0.1), r(false, 0.0)), r(false, 0.0));
    }

    #[test]
    fn test_repeatable() {
        let c = Combiner::default();
        let rule = vec![r(false, 0.1), r(true, 0.8), r(false, 0.1)];
        let ml = vec![r(true, 0.9), r(false, 0.2), r(true, 0.4)];
        let first = c.combine_batch(&rule, &ml);
        for _ in 0..10 {
            assert_eq!(c.combine_batch(&rule, &ml), first);
        }
    }

    #[test]
    fn test_short_ml_slice_padded_with_normal() {
        let c = Combiner::default();
        let out = c.combine_batch(&[r(false, 0.1), r(true, 0.8)], &[]);
        assert_eq!(out, vec![r(false, 0.0), r(true, 0.8)]);
    }
}
