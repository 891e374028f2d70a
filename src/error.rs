use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Batch-level structural failures. Per-line data problems never end up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Malformed line at index {index}: {detail}")]
    MalformedLine { index: usize, detail: String },

    #[error("Malformed field `{field}` at index {index}: {detail}")]
    MalformedField {
        index: usize,
        field: String,
        detail: String,
    },

    #[error("Malformed feature `{feature}` at row {index}: value {value}")]
    MalformedFeature {
        index: usize,
        feature: &'static str,
        value: f64,
    },
}

impl ScoringError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::MalformedBatch(_) => "malformed_batch",
            ScoringError::MalformedLine { .. } => "malformed_line",
            ScoringError::MalformedField { .. } => "malformed_field",
            ScoringError::MalformedFeature { .. } => "malformed_feature",
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            ScoringError::MalformedBatch(_) => None,
            ScoringError::MalformedLine { index, .. }
            | ScoringError::MalformedField { index, .. }
            | ScoringError::MalformedFeature { index, .. } => Some(*index),
        }
    }
}

/// Why a model artifact could not be used. Consumed by mode selection, never surfaced to scorers.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model file missing: {0}")]
    Missing(PathBuf),

    #[error("model file unreadable: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model file corrupt: {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model incompatible: {0}")]
    Incompatible(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, kind, index) = match &self {
            AppError::Scoring(err) => (
                StatusCode::BAD_REQUEST,
                self.to_string(),
                Some(err.kind()),
                err.index(),
            ),
            AppError::InvalidBody(rejection) => (
                rejection.status(),
                self.to_string(),
                Some("invalid_body"),
                None,
            ),
            AppError::Internal(_) => {
                tracing::error!("Internal server error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                    None,
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
            "index": index,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}
