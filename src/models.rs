//! Pre-trained model artifacts and the one-shot loading step that decides the scoring mode.

use crate::{
    config::ModelConfig,
    error::ModelLoadError,
    features::{feature_index, FeatureVector, FEATURE_NAMES},
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

pub const ANOMALY_ARTIFACT: &str = "anomaly_model";
pub const CLASSIFIER_ARTIFACT: &str = "overspend_classifier";

fn default_anomaly_threshold() -> f64 {
    3.0
}

fn default_classifier_threshold() -> f64 {
    0.5
}

fn default_version() -> String {
    "v1.0.0".to_string()
}

/// On-disk form of the anomaly model: per-feature centring and scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModelFile {
    #[serde(default = "default_version")]
    pub version: String,
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default = "default_anomaly_threshold")]
    pub threshold: f64,
}

/// On-disk form of the overspend classifier: logistic regression weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierFile {
    #[serde(default = "default_version")]
    pub version: String,
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub weights: Vec<f64>,
    #[serde(default = "default_classifier_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub struct AnomalyModel {
    pub version: String,
    columns: Vec<usize>,
    mean: DVector<f64>,
    scale: DVector<f64>,
    pub threshold: f64,
}

impl AnomalyModel {
    pub fn from_file(file: AnomalyModelFile) -> Result<Self, ModelLoadError> {
        let columns = resolve_columns(ANOMALY_ARTIFACT, &file.feature_names)?;
        let n = columns.len();
        if file.mean.len() != n || file.scale.len() != n {
            return Err(ModelLoadError::Incompatible(format!(
                "{}: expected {} mean/scale entries, found {}/{}",
                ANOMALY_ARTIFACT,
                n,
                file.mean.len(),
                file.scale.len()
            )));
        }
        if file.mean.iter().any(|m| !m.is_finite()) {
            return Err(ModelLoadError::Incompatible(format!(
                "{}: non-finite mean",
                ANOMALY_ARTIFACT
            )));
        }
        if file.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ModelLoadError::Incompatible(format!(
                "{}: scale entries must be positive",
                ANOMALY_ARTIFACT
            )));
        }
        check_threshold(ANOMALY_ARTIFACT, file.threshold)?;

        Ok(Self {
            version: file.version,
            columns,
            mean: DVector::from_vec(file.mean),
            scale: DVector::from_vec(file.scale),
            threshold: file.threshold,
        })
    }

    /// Root-mean-square z-score over the model's features. Absent inputs sit at the mean.
    pub fn score(&self, features: &FeatureVector) -> f64 {
        let x = project(&self.columns, features, Some(&self.mean));
        let z = (x - &self.mean).component_div(&self.scale);
        rms(&z)
    }

    pub fn is_anomalous(&self, score: f64) -> bool {
        score >= self.threshold
    }
}

#[derive(Debug, Clone)]
pub struct OverspendClassifier {
    pub version: String,
    columns: Vec<usize>,
    intercept: f64,
    weights: DVector<f64>,
    pub threshold: f64,
}

impl OverspendClassifier {
    pub fn from_file(file: ClassifierFile) -> Result<Self, ModelLoadError> {
        let columns = resolve_columns(CLASSIFIER_ARTIFACT, &file.feature_names)?;
        if file.weights.len() != columns.len() {
            return Err(ModelLoadError::Incompatible(format!(
                "{}: expected {} weights, found {}",
                CLASSIFIER_ARTIFACT,
                columns.len(),
                file.weights.len()
            )));
        }
        if !file.intercept.is_finite() || file.weights.iter().any(|w| !w.is_finite()) {
            return Err(ModelLoadError::Incompatible(format!(
                "{}: non-finite weights",
                CLASSIFIER_ARTIFACT
            )));
        }
        check_threshold(CLASSIFIER_ARTIFACT, file.threshold)?;

        Ok(Self {
            version: file.version,
            columns,
            intercept: file.intercept,
            weights: DVector::from_vec(file.weights),
            threshold: file.threshold,
        })
    }

    /// Absent inputs contribute nothing to the logit.
    pub fn predict_probability(&self, features: &FeatureVector) -> f64 {
        let x = project(&self.columns, features, None);
        let z = self.intercept + self.weights.dot(&x);
        sigmoid(z)
    }

    pub fn is_overspend(&self, probability: f64) -> bool {
        probability >= self.threshold
    }
}

/// Both artifacts, loaded and checked against the extractor's feature layout.
#[derive(Debug, Clone)]
pub struct ModelPair {
    pub anomaly: AnomalyModel,
    pub classifier: OverspendClassifier,
}

/// Result of one load attempt. Fallback is an expected outcome, not an error.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(ModelPair),
    Fallback {
        reason: String,
        loaded_artifacts: Vec<String>,
    },
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }
}

pub fn try_load_models(config: &ModelConfig) -> LoadOutcome {
    if !config.model_dir.is_dir() {
        let reason = format!("model directory missing: {}", config.model_dir.display());
        warn!(model_dir = %config.model_dir.display(), "Model directory not found, using deterministic fallback");
        return LoadOutcome::Fallback {
            reason,
            loaded_artifacts: Vec::new(),
        };
    }

    let anomaly = load_json::<AnomalyModelFile>(&config.anomaly_path()).and_then(AnomalyModel::from_file);
    let classifier =
        load_json::<ClassifierFile>(&config.classifier_path()).and_then(OverspendClassifier::from_file);

    match (anomaly, classifier) {
        (Ok(anomaly), Ok(classifier)) => {
            info!(
                anomaly_version = %anomaly.version,
                classifier_version = %classifier.version,
                "Model artifacts loaded"
            );
            LoadOutcome::Loaded(ModelPair {
                anomaly,
                classifier,
            })
        }
        (anomaly, classifier) => {
            let mut loaded_artifacts = Vec::new();
            let mut causes = Vec::new();
            match anomaly {
                Ok(_) => loaded_artifacts.push(ANOMALY_ARTIFACT.to_string()),
                Err(e) => causes.push(e.to_string()),
            }
            match classifier {
                Ok(_) => loaded_artifacts.push(CLASSIFIER_ARTIFACT.to_string()),
                Err(e) => causes.push(e.to_string()),
            }
            let reason = causes.join("; ");
            warn!(reason = %reason, loaded = ?loaded_artifacts, "Model load failed, using deterministic fallback");
            LoadOutcome::Fallback {
                reason,
                loaded_artifacts,
            }
        }
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::Missing(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_columns(artifact: &str, names: &[String]) -> Result<Vec<usize>, ModelLoadError> {
    if names.is_empty() {
        return Err(ModelLoadError::Incompatible(format!(
            "{}: no feature_names",
            artifact
        )));
    }
    names
        .iter()
        .map(|name| {
            feature_index(name).ok_or_else(|| {
                ModelLoadError::Incompatible(format!(
                    "{}: unknown feature `{}` (known: {})",
                    artifact,
                    name,
                    FEATURE_NAMES.join(", ")
                ))
            })
        })
        .collect()
}

fn check_threshold(artifact: &str, threshold: f64) -> Result<(), ModelLoadError> {
    if threshold.is_finite() {
        Ok(())
    } else {
        Err(ModelLoadError::Incompatible(format!(
            "{}: non-finite threshold",
            artifact
        )))
    }
}

/// Picks the model's columns out of a feature row. Absent inputs take the matching `fill`
/// entry, or 0 without one.
fn project(columns: &[usize], features: &FeatureVector, fill: Option<&DVector<f64>>) -> DVector<f64> {
    let row = features.to_array();
    DVector::from_iterator(
        columns.len(),
        columns.iter().enumerate().map(|(k, &i)| {
            if features.column_missing(i) {
                fill.map(|f| f[k]).unwrap_or(0.0)
            } else {
                row[i]
            }
        }),
    )
}

/// Scaled by the largest component so huge but finite inputs do not overflow the sum of squares.
fn rms(z: &DVector<f64>) -> f64 {
    if z.is_empty() {
        return 0.0;
    }
    let peak = z.amax();
    if peak == 0.0 {
        return 0.0;
    }
    if !peak.is_finite() {
        return f64::MAX;
    }
    let scaled = z / peak;
    peak * (scaled.norm_squared() / z.len() as f64).sqrt()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
