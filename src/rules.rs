//! Deterministic scoring used whenever the model artifacts are unavailable.

use crate::{
    config::RuleConfig,
    features::FeatureVector,
    strategy::{build_result, ScoringStrategy},
    types::{ScoreResult, ScoringMethod},
};

pub struct DeterministicStrategy {
    rules: RuleConfig,
    reason: String,
}

impl DeterministicStrategy {
    pub fn new(rules: RuleConfig, reason: impl Into<String>) -> Self {
        Self {
            rules,
            reason: reason.into(),
        }
    }

    /// Low score every line gets; grows with the amount so unflagged lines are not all identical.
    fn baseline(&self, features: &FeatureVector) -> f64 {
        let share = if self.rules.amount_threshold > 0.0 {
            (features.line_total / self.rules.amount_threshold).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.rules.baseline_score + self.rules.baseline_spread * share
    }
}

impl ScoringStrategy for DeterministicStrategy {
    fn method(&self) -> ScoringMethod {
        ScoringMethod::DeterministicFallback
    }

    fn fallback_reason(&self) -> Option<&str> {
        Some(&self.reason)
    }

    fn score_line(&self, features: &FeatureVector) -> ScoreResult {
        let mut reasons = Vec::new();
        let mut score = self.baseline(features);

        if features.has_rate() && features.rate >= self.rules.rate_threshold {
            reasons.push(format!("High rate: ${:.1}/hr", features.rate));
            score += self.rules.rate_weight;
        }

        if features.has_line_total() && features.line_total >= self.rules.amount_threshold {
            reasons.push(format!("High line total: ${:.1}", features.line_total));
            score += self.rules.amount_weight;
        }

        if features.keyword_flag {
            reasons.push(format!(
                "Suspicious description: {}",
                features.matched_keywords.join(", ")
            ));
            score += self.rules.keyword_weight;
        }

        // raises the score, never flags on its own
        if features.round_hours_flag {
            score += self.rules.round_hours_weight;
        }

        build_result(score, reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::FeatureConfig,
        features::FeatureExtractor,
        types::{RawLineItem, REASON_NORMAL},
    };

    fn score(line: RawLineItem) -> ScoreResult {
        let features = FeatureExtractor::new(&FeatureConfig::default()).extract_line(&line);
        DeterministicStrategy::new(RuleConfig::default(), "model files missing").score_line(&features)
    }

    #[test]
    fn test_high_rate_and_total() {
        let result = score(RawLineItem::new("", 5.0, 1000.0));
        assert!(result.flagged);
        assert_eq!(result.reason, "High rate: $1000.0/hr; High line total: $5000.0");
        // baseline 0.1 + 0.4 + rate 3.0 + amount 2.0
        assert!((result.score - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_clean_line() {
        let result = score(RawLineItem::new("Partner work", 3.0, 450.0));
        assert!(!result.flagged);
        assert_eq!(result.reason, REASON_NORMAL);
        assert!(result.score > 0.0 && result.score < 1.0);
    }

    #[test]
    fn test_keyword_rule() {
        let result = score(RawLineItem::new("Travel to deposition", 2.0, 300.0));
        assert!(result.flagged);
        assert_eq!(result.reason, "Suspicious description: travel");
    }

    #[test]
    fn test_amount_only_line() {
        let result = score(RawLineItem {
            description: Some("Expert fees".into()),
            line_total: Some(12000.0),
            ..Default::default()
        });
        assert!(result.flagged);
        assert_eq!(result.reason, "High line total: $12000.0");
    }

    #[test]
    fn test_round_hours_raise_score_without_flagging() {
        let plain = score(RawLineItem::new("Research", 7.5, 300.0));
        let round = score(RawLineItem::new("Research", 10.0, 300.0));
        assert!(!round.flagged);
        assert_eq!(round.reason, REASON_NORMAL);
        assert!(round.score > plain.score);
    }

    #[test]
    fn test_baseline_varies_with_amount() {
        let small = score(RawLineItem::new("Call", 0.5, 200.0));
        let larger = score(RawLineItem::new("Call", 4.0, 400.0));
        assert!(larger.score > small.score);
    }

    #[test]
    fn test_reports_fallback_reason() {
        let strategy = DeterministicStrategy::new(RuleConfig::default(), "model files missing");
        assert_eq!(strategy.fallback_reason(), Some("model files missing"));
        assert_eq!(strategy.method(), ScoringMethod::DeterministicFallback);
    }
}
