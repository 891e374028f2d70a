use crate::{
    config::ModelScoringConfig,
    features::FeatureVector,
    models::ModelPair,
    types::{ScoreResult, ScoringMethod},
};

pub const REASON_ANOMALY: &str = "Anomalous billing pattern detected";
pub const REASON_CLASSIFIER: &str = "High rate flagged by classifier";

/// Joins fired rule/model reasons into the single `reason` string of a result.
pub const REASON_SEPARATOR: &str = "; ";

/// Ceiling for model scores that would otherwise overflow.
pub const MAX_SCORE: f64 = f64::MAX;

/// One way of turning a feature vector into a score. The engine picks one per mode resolution
/// and uses it for every line of a batch.
pub trait ScoringStrategy: Send + Sync {
    fn method(&self) -> ScoringMethod;

    /// Cause recorded when the model path was unavailable.
    fn fallback_reason(&self) -> Option<&str> {
        None
    }

    /// Lines with no numeric data never reach this; the engine answers those itself.
    fn score_line(&self, features: &FeatureVector) -> ScoreResult;
}

pub(crate) fn build_result(score: f64, reasons: Vec<String>) -> ScoreResult {
    if reasons.is_empty() {
        ScoreResult::normal(score)
    } else {
        ScoreResult {
            score,
            flagged: true,
            reason: reasons.join(REASON_SEPARATOR),
        }
    }
}

pub struct ModelStrategy {
    models: ModelPair,
    weights: ModelScoringConfig,
}

impl ModelStrategy {
    pub fn new(models: ModelPair, weights: ModelScoringConfig) -> Self {
        Self { models, weights }
    }
}

impl ScoringStrategy for ModelStrategy {
    fn method(&self) -> ScoringMethod {
        ScoringMethod::Ml
    }

    fn score_line(&self, features: &FeatureVector) -> ScoreResult {
        let anomaly_score = self.models.anomaly.score(features);
        let probability = self.models.classifier.predict_probability(features);

        let mut reasons = Vec::new();
        let mut score = self.weights.anomaly_weight * anomaly_score;

        if self.models.anomaly.is_anomalous(anomaly_score) {
            reasons.push(REASON_ANOMALY.to_string());
        }
        if self.models.classifier.is_overspend(probability) {
            score += self.weights.classifier_boost * probability;
            reasons.push(REASON_CLASSIFIER.to_string());
        }
        if !score.is_finite() {
            score = MAX_SCORE;
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
        models::{AnomalyModel, AnomalyModelFile, ClassifierFile, OverspendClassifier},
        types::{RawLineItem, REASON_NORMAL},
    };

    fn strategy() -> ModelStrategy {
        let anomaly = AnomalyModel::from_file(AnomalyModelFile {
            version: "t".into(),
            feature_names: vec!["rate".into()],
            mean: vec![400.0],
            scale: vec![100.0],
            threshold: 3.0,
        })
        .unwrap();
        let classifier = OverspendClassifier::from_file(ClassifierFile {
            version: "t".into(),
            feature_names: vec!["hours".into()],
            intercept: -10.0,
            weights: vec![1.0],
            threshold: 0.5,
        })
        .unwrap();
        ModelStrategy::new(
            ModelPair {
                anomaly,
                classifier,
            },
            ModelScoringConfig::default(),
        )
    }

    fn line(hours: f64, rate: f64) -> FeatureVector {
        FeatureExtractor::new(&FeatureConfig::default()).extract_line(&RawLineItem::new("", hours, rate))
    }

    #[test]
    fn test_normal_line() {
        let result = strategy().score_line(&line(2.0, 420.0));
        assert!(!result.flagged);
        assert_eq!(result.reason, REASON_NORMAL);
        assert!((result.score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_anomaly_only() {
        let result = strategy().score_line(&line(2.0, 900.0));
        assert!(result.flagged);
        assert_eq!(result.reason, REASON_ANOMALY);
        assert!((result.score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_line_scores_as_normal() {
        let extractor = FeatureExtractor::new(&FeatureConfig::default());
        let hours_only = extractor.extract_line(&RawLineItem {
            description: Some("Call".into()),
            hours: Some(2.0),
            ..Default::default()
        });
        let result = strategy().score_line(&hours_only);
        assert!(!result.flagged);
        assert_eq!(result.reason, REASON_NORMAL);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_overflowing_score_is_capped() {
        let mut weights = ModelScoringConfig::default();
        weights.anomaly_weight = 1e10;
        let strategy = ModelStrategy::new(strategy().models, weights);

        let result = strategy.score_line(&line(1.0, 1e307));
        assert!(result.flagged);
        assert_eq!(result.score, MAX_SCORE);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["score"].is_f64());
    }

    #[test]
    fn test_both_signals_combine() {
        // hours 20 -> logistic(10) ~ 0.99995
        let result = strategy().score_line(&line(20.0, 900.0));
        assert!(result.flagged);
        assert_eq!(
            result.reason,
            format!("{}{}{}", REASON_ANOMALY, REASON_SEPARATOR, REASON_CLASSIFIER)
        );
        assert!(result.score > 5.0 + 1.99);
        assert_eq!(strategy().method(), ScoringMethod::Ml);
        assert!(strategy().fallback_reason().is_none());
    }
}
