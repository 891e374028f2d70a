use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const NOTE_ML_SUCCESS: &str = "ML models used successfully";
pub const NOTE_MODEL_FALLBACK: &str = "model_fallback";

pub const REASON_NORMAL: &str = "Normal billing pattern";
pub const REASON_INSUFFICIENT_DATA: &str = "Insufficient data for analysis";

/// One billable entry from an invoice, as normalized by the upstream parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hours: Option<f64>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub line_total: Option<f64>,
}

impl RawLineItem {
    pub fn new(description: impl Into<String>, hours: f64, rate: f64) -> Self {
        Self {
            description: Some(description.into()),
            hours: Some(hours),
            rate: Some(rate),
            line_total: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub flagged: bool,
    pub reason: String,
}

impl ScoreResult {
    pub fn normal(score: f64) -> Self {
        Self {
            score,
            flagged: false,
            reason: REASON_NORMAL.to_string(),
        }
    }

    pub fn insufficient_data() -> Self {
        Self {
            score: 0.0,
            flagged: false,
            reason: REASON_INSUFFICIENT_DATA.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    Ml,
    DeterministicFallback,
}

impl ScoringMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMethod::Ml => "ml",
            ScoringMethod::DeterministicFallback => "deterministic_fallback",
        }
    }

    pub fn note(&self) -> &'static str {
        match self {
            ScoringMethod::Ml => NOTE_ML_SUCCESS,
            ScoringMethod::DeterministicFallback => NOTE_MODEL_FALLBACK,
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub method: ScoringMethod,
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub total_lines: usize,
    pub flagged_lines: usize,
    pub insufficient_lines: usize,
    pub batch_id: Uuid,
    pub scored_at: DateTime<Utc>,
}

/// Index-aligned results for one scoring call plus the metadata describing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<ScoreResult>,
    pub metadata: BatchMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Uninitialized,
    Loading,
    Model,
    Fallback,
}

/// Read-only view of which scoring mode is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub models_loaded: bool,
    pub fallback_mode: bool,
    pub phase: EnginePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub loaded_artifacts: Vec<String>,
    pub model_dir: String,
    pub reloads: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}
