use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::artifact::{ArtifactError, ArtifactStore};
use super::dataset::{load_examples, DatasetError};
use super::forest::ForestParams;
use super::model::{bounded_score, TrainedModel};
use super::sanitiser::{sanitise, SanitisedInput};
use super::schema::FeatureVector;
use super::training::{train, TrainingError, ValidationReport};
use crate::config::ModelConfig;

/// How `ensure_ready` obtained the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Readiness {
    AlreadyLoaded,
    Loaded,
    Trained(ValidationReport),
}

impl Readiness {
    pub fn trained(&self) -> bool {
        matches!(self, Readiness::Trained(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub score: u8,
    pub raw_score: f64,
    /// Set when this call had to train the model first, which makes it slow.
    pub trained_now: bool,
    pub defaulted_fields: Vec<&'static str>,
}

#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error("failed to persist trained model: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Owns the mental state regressor and its lifecycle.
///
/// The model is loaded from the artifact on first use or trained from the
/// dataset when no usable artifact exists. Loading and training run under a
/// single guard, so concurrent cold callers train at most once.
pub struct Predictor {
    artifacts: ArtifactStore,
    dataset_path: PathBuf,
    params: ForestParams,
    model: RwLock<Option<Arc<TrainedModel>>>,
    training_guard: Mutex<()>,
    training_runs: AtomicUsize,
}

impl Predictor {
    pub fn new(artifact_path: impl Into<PathBuf>, dataset_path: impl Into<PathBuf>) -> Self {
        Self::with_params(artifact_path, dataset_path, ForestParams::default())
    }

    pub fn with_params(
        artifact_path: impl Into<PathBuf>,
        dataset_path: impl Into<PathBuf>,
        params: ForestParams,
    ) -> Self {
        Self {
            artifacts: ArtifactStore::new(artifact_path),
            dataset_path: dataset_path.into(),
            params,
            model: RwLock::new(None),
            training_guard: Mutex::new(()),
            training_runs: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.artifact_path.clone(), config.dataset_path.clone())
    }

    pub fn artifact_path(&self) -> &Path {
        self.artifacts.path()
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// Training runs performed by this predictor since construction.
    pub fn training_runs(&self) -> usize {
        self.training_runs.load(Ordering::Relaxed)
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Loads or trains the model if it is not in memory yet. Repeated calls are
    /// no-ops once a model is available.
    pub fn ensure_ready(&self) -> Result<Readiness, PredictorError> {
        self.ready_model().map(|(_, readiness)| readiness)
    }

    /// Retrains from the dataset and overwrites the artifact unconditionally.
    pub fn retrain(&self) -> Result<ValidationReport, PredictorError> {
        let _guard = self
            .training_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.train_locked().map(|(_, report)| report)
    }

    pub fn predict(&self, raw: &Map<String, Value>) -> Result<Prediction, PredictorError> {
        let (model, readiness) = self.ready_model()?;
        let SanitisedInput {
            features,
            defaulted,
        } = sanitise(raw);

        let raw_score = model.predict(&features);
        Ok(Prediction {
            score: bounded_score(raw_score),
            raw_score,
            trained_now: readiness.trained(),
            defaulted_fields: defaulted.iter().map(|(feature, _)| feature.column()).collect(),
        })
    }

    /// Scores an already sanitised vector.
    pub fn predict_features(&self, features: &FeatureVector) -> Result<u8, PredictorError> {
        let (model, _) = self.ready_model()?;
        Ok(bounded_score(model.predict(features)))
    }

    fn current(&self) -> Option<Arc<TrainedModel>> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, model: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(model);
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(model.clone());
        model
    }

    fn ready_model(&self) -> Result<(Arc<TrainedModel>, Readiness), PredictorError> {
        if let Some(model) = self.current() {
            return Ok((model, Readiness::AlreadyLoaded));
        }

        let _guard = self
            .training_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = self.current() {
            return Ok((model, Readiness::AlreadyLoaded));
        }

        if self.artifacts.exists() {
            match self.artifacts.load() {
                Ok(model) => {
                    info!(path = %self.artifacts.path().display(), "loaded mental state model");
                    return Ok((self.install(model), Readiness::Loaded));
                }
                Err(err) => {
                    warn!(
                        path = %self.artifacts.path().display(),
                        error = %err,
                        "discarding unusable model artifact, retraining"
                    );
                    if let Err(err) = self.artifacts.discard() {
                        warn!(error = %err, "could not remove unusable model artifact");
                    }
                }
            }
        } else {
            info!(
                path = %self.artifacts.path().display(),
                "no model artifact found, training before first prediction"
            );
        }

        let (model, report) = self.train_locked()?;
        Ok((model, Readiness::Trained(report)))
    }

    fn train_locked(&self) -> Result<(Arc<TrainedModel>, ValidationReport), PredictorError> {
        let started = Instant::now();
        let examples = load_examples(&self.dataset_path)?;
        let (model, report) = train(&examples, &self.params)?;
        self.artifacts.save(&model)?;
        self.training_runs.fetch_add(1, Ordering::Relaxed);

        info!(
            path = %self.artifacts.path().display(),
            examples = examples.len(),
            n_trees = self.params.n_trees,
            mae = report.mae,
            r2 = ?report.r2,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model retrained and saved"
        );

        Ok((self.install(model), report))
    }
}
