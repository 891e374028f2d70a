use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub const CONFIG_PATH_VAR: &str = "RISK_ENGINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_PREFIX: &str = "RISK_ENGINE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub features: FeatureConfig,
    pub rules: RuleConfig,
    pub model_scoring: ModelScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding the two serialized model artifacts.
    pub model_dir: PathBuf,
    pub anomaly_file: String,
    pub classifier_file: String,
    /// Defer artifact loading until the first scoring call.
    pub lazy_load: bool,
}

impl ModelConfig {
    pub fn anomaly_path(&self) -> PathBuf {
        self.model_dir.join(&self.anomaly_file)
    }

    pub fn classifier_path(&self) -> PathBuf {
        self.model_dir.join(&self.classifier_file)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            anomaly_file: "anomaly_model.json".to_string(),
            classifier_file: "overspend_classifier.json".to_string(),
            lazy_load: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Hourly rate considered typical; `rate_ratio` is measured against it.
    pub benchmark_rate: f64,
    pub round_hours_threshold: f64,
    pub suspicious_keywords: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            benchmark_rate: 500.0,
            round_hours_threshold: 8.0,
            suspicious_keywords: [
                "travel",
                "admin",
                "clerical",
                "filing",
                "photocopy",
                "scanning",
                "excessive review",
                "internal conference",
                "overtime",
                "training",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

/// Thresholds and weights for deterministic scoring.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub rate_threshold: f64,
    pub amount_threshold: f64,
    pub rate_weight: f64,
    pub amount_weight: f64,
    pub keyword_weight: f64,
    pub round_hours_weight: f64,
    pub baseline_score: f64,
    pub baseline_spread: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            rate_threshold: 1000.0,
            amount_threshold: 5000.0,
            rate_weight: 3.0,
            amount_weight: 2.0,
            keyword_weight: 1.5,
            round_hours_weight: 0.5,
            baseline_score: 0.1,
            baseline_spread: 0.4,
        }
    }
}

/// How the anomaly model and classifier outputs combine into one score.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelScoringConfig {
    pub anomaly_weight: f64,
    pub classifier_boost: f64,
}

impl Default for ModelScoringConfig {
    fn default() -> Self {
        Self {
            anomaly_weight: 1.0,
            classifier_boost: 2.0,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `RISK_ENGINE_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
