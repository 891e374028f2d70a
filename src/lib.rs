//! Invoice line-item risk scoring.
//!
//! Raw billing lines are turned into feature vectors and scored in batches, either by a pair of
//! pre-trained models or, when those cannot be loaded, by deterministic threshold rules. Every
//! batch reports which of the two produced it.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod rules;
pub mod strategy;
pub mod types;

pub use config::Config;
pub use engine::{Scorer, ScoringEngine};
pub use error::ScoringError;
pub use features::{FeatureExtractor, FeatureVector};
pub use types::{BatchMetadata, BatchOutcome, ModelStatus, RawLineItem, ScoreResult, ScoringMethod};
