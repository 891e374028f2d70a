use crate::{
    config::Config,
    error::ScoringError,
    features::FeatureExtractor,
    metrics,
    models::{try_load_models, LoadOutcome, ANOMALY_ARTIFACT, CLASSIFIER_ARTIFACT},
    rules::DeterministicStrategy,
    strategy::{ModelStrategy, ScoringStrategy},
    types::*,
};
use parking_lot::RwLock;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::{debug, info};
use uuid::Uuid;

/// What hosts hold on to. Lets request handlers be tested against a fake.
pub trait Scorer: Send + Sync {
    fn score_batch(&self, lines: &[RawLineItem]) -> Result<BatchOutcome, ScoringError>;
    fn status(&self) -> ModelStatus;
    fn reload(&self) -> ModelStatus;
}

struct ActiveMode {
    strategy: Arc<dyn ScoringStrategy>,
    loaded_artifacts: Vec<String>,
}

enum ModeState {
    Uninitialized,
    Ready(Arc<ActiveMode>),
}

/// Owns the process-wide scoring mode. Built once at startup and shared by reference.
pub struct ScoringEngine {
    config: Config,
    extractor: FeatureExtractor,
    mode: RwLock<ModeState>,
    reloads: AtomicU64,
}

impl ScoringEngine {
    /// Mode stays unresolved until [`initialize`](Self::initialize) or the first scoring call.
    pub fn new(config: Config) -> Self {
        let extractor = FeatureExtractor::new(&config.features);
        Self {
            config,
            extractor,
            mode: RwLock::new(ModeState::Uninitialized),
            reloads: AtomicU64::new(0),
        }
    }

    /// Skips loading entirely and scores with the given strategy.
    pub fn with_strategy(config: Config, strategy: Arc<dyn ScoringStrategy>) -> Self {
        let engine = Self::new(config);
        *engine.mode.write() = ModeState::Ready(Arc::new(ActiveMode {
            strategy,
            loaded_artifacts: Vec::new(),
        }));
        engine
    }

    /// Startup hook: resolves the mode now instead of on first use.
    pub fn initialize(&self) -> ModelStatus {
        self.active();
        self.status()
    }

    pub fn score_batch(&self, lines: &[RawLineItem]) -> Result<BatchOutcome, ScoringError> {
        let start = Instant::now();
        let active = self.active();
        let strategy = active.strategy.as_ref();

        let table = self.extractor.extract(lines);
        table.validate()?;

        let mut insufficient_lines = 0;
        let results: Vec<ScoreResult> = table
            .iter()
            .map(|features| {
                if features.insufficient_data() {
                    insufficient_lines += 1;
                    ScoreResult::insufficient_data()
                } else {
                    strategy.score_line(features)
                }
            })
            .collect();

        let flagged_lines = results.iter().filter(|r| r.flagged).count();
        let method = strategy.method();

        let metadata = BatchMetadata {
            method,
            note: method.note().to_string(),
            reason: strategy.fallback_reason().map(str::to_string),
            total_lines: results.len(),
            flagged_lines,
            insufficient_lines,
            batch_id: Uuid::new_v4(),
            scored_at: chrono::Utc::now(),
        };

        let elapsed = start.elapsed();
        metrics::record_batch(method, results.len(), flagged_lines, elapsed);
        debug!(
            batch_id = %metadata.batch_id,
            method = %method,
            lines = results.len(),
            flagged = flagged_lines,
            insufficient = insufficient_lines,
            elapsed_us = elapsed.as_micros() as u64,
            "Scored batch"
        );

        Ok(BatchOutcome { results, metadata })
    }

    pub fn status(&self) -> ModelStatus {
        let model_dir = self.config.models.model_dir.display().to_string();
        let reloads = self.reloads.load(Ordering::Relaxed);

        // a writer holds the lock only while artifacts are being loaded
        let Some(guard) = self.mode.try_read() else {
            return ModelStatus {
                models_loaded: false,
                fallback_mode: false,
                phase: EnginePhase::Loading,
                fallback_reason: None,
                loaded_artifacts: Vec::new(),
                model_dir,
                reloads,
            };
        };

        match &*guard {
            ModeState::Uninitialized => ModelStatus {
                models_loaded: false,
                fallback_mode: false,
                phase: EnginePhase::Uninitialized,
                fallback_reason: None,
                loaded_artifacts: Vec::new(),
                model_dir,
                reloads,
            },
            ModeState::Ready(active) => {
                let method = active.strategy.method();
                ModelStatus {
                    models_loaded: method == ScoringMethod::Ml,
                    fallback_mode: method == ScoringMethod::DeterministicFallback,
                    phase: match method {
                        ScoringMethod::Ml => EnginePhase::Model,
                        ScoringMethod::DeterministicFallback => EnginePhase::Fallback,
                    },
                    fallback_reason: active.strategy.fallback_reason().map(str::to_string),
                    loaded_artifacts: active.loaded_artifacts.clone(),
                    model_dir,
                    reloads,
                }
            }
        }
    }

    /// Re-reads the model artifacts and swaps the mode. Batches already running finish on the old one.
    pub fn reload(&self) -> ModelStatus {
        let method = {
            let mut guard = self.mode.write();
            let active = Arc::new(self.resolve());
            let method = active.strategy.method();
            *guard = ModeState::Ready(active);
            method
        };

        let reloads = self.reloads.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_reload(method);
        info!(method = %method, reloads, "Scoring mode reloaded");
        self.status()
    }

    fn active(&self) -> Arc<ActiveMode> {
        {
            let guard = self.mode.read();
            if let ModeState::Ready(active) = &*guard {
                return Arc::clone(active);
            }
        }

        let mut guard = self.mode.write();
        // another caller may have resolved it while we waited
        if let ModeState::Ready(active) = &*guard {
            return Arc::clone(active);
        }
        let active = Arc::new(self.resolve());
        *guard = ModeState::Ready(Arc::clone(&active));
        active
    }

    fn resolve(&self) -> ActiveMode {
        info!(model_dir = %self.config.models.model_dir.display(), "Loading scoring models");

        match try_load_models(&self.config.models) {
            LoadOutcome::Loaded(models) => {
                info!("Scoring in model mode");
                ActiveMode {
                    strategy: Arc::new(ModelStrategy::new(
                        models,
                        self.config.model_scoring.clone(),
                    )),
                    loaded_artifacts: vec![
                        ANOMALY_ARTIFACT.to_string(),
                        CLASSIFIER_ARTIFACT.to_string(),
                    ],
                }
            }
            LoadOutcome::Fallback {
                reason,
                loaded_artifacts,
            } => {
                info!(reason = %reason, "Scoring in deterministic fallback mode");
                ActiveMode {
                    strategy: Arc::new(DeterministicStrategy::new(
                        self.config.rules.clone(),
                        reason,
                    )),
                    loaded_artifacts,
                }
            }
        }
    }
}

impl Scorer for ScoringEngine {
    fn score_batch(&self, lines: &[RawLineItem]) -> Result<BatchOutcome, ScoringError> {
        ScoringEngine::score_batch(self, lines)
    }

    fn status(&self) -> ModelStatus {
        ScoringEngine::status(self)
    }

    fn reload(&self) -> ModelStatus {
        ScoringEngine::reload(self)
    }
}
