use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use super::form::canonical_form;
use super::repository::{StorageError, SubmissionRecord, SubmissionRepository, DEFAULT_USER};
use crate::prediction::{sanitise, Prediction, Predictor, PredictorError, SanitisedInput};
use crate::wellness::{AdviceSource, WellnessAdvisor};

/// Where the input page should navigate once a submission is scored.
pub const RESULTS_REDIRECT: &str = "/results";

/// Service composing the predictor, the submission store and the advisor.
pub struct SubmissionService<R> {
    predictor: Arc<Predictor>,
    repository: Arc<R>,
    advisor: WellnessAdvisor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub submission_id: i64,
    pub mental_state: u8,
    pub suggestion: String,
    pub advice_source: AdviceSource,
    pub defaulted_fields: Vec<&'static str>,
}

impl<R> SubmissionService<R>
where
    R: SubmissionRepository + 'static,
{
    pub fn new(predictor: Arc<Predictor>, repository: Arc<R>, advisor: WellnessAdvisor) -> Self {
        Self {
            predictor,
            repository,
            advisor,
        }
    }

    pub fn predictor(&self) -> &Arc<Predictor> {
        &self.predictor
    }

    /// Scores a raw feature map off the async runtime, since a cold predictor
    /// trains before answering.
    pub async fn predict(&self, raw: Map<String, Value>) -> Result<Prediction, SubmissionError> {
        let predictor = Arc::clone(&self.predictor);
        let prediction = tokio::task::spawn_blocking(move || predictor.predict(&raw)).await??;
        Ok(prediction)
    }

    /// Stores the form, scores it, asks for advice and records the outcome
    /// against the inserted row.
    pub async fn submit(
        &self,
        form: Map<String, Value>,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let SanitisedInput {
            features,
            defaulted,
        } = sanitise(&canonical_form(&form));

        let submission_id = self
            .with_repository(move |repository| repository.insert(DEFAULT_USER, &features))
            .await?;

        let predictor = Arc::clone(&self.predictor);
        let mental_state =
            tokio::task::spawn_blocking(move || predictor.predict_features(&features)).await??;

        let history = self.with_repository(|repository| repository.history()).await?;
        let advice = self.advisor.suggest(mental_state, &features, &history).await;
        let summary = self.advisor.summarise(&advice.text).await;

        let suggestion = advice.text.clone();
        self.with_repository(move |repository| {
            repository.record_result(submission_id, mental_state, &suggestion, &summary)
        })
        .await?;

        info!(
            submission_id,
            mental_state,
            advice_source = ?advice.source,
            defaulted = defaulted.len(),
            "submission scored"
        );

        Ok(SubmissionOutcome {
            submission_id,
            mental_state,
            suggestion: advice.text,
            advice_source: advice.source,
            defaulted_fields: defaulted.iter().map(|(feature, _)| feature.column()).collect(),
        })
    }

    pub async fn get(&self, id: i64) -> Result<SubmissionRecord, SubmissionError> {
        self.with_repository(move |repository| repository.fetch(id))
            .await?
            .ok_or(SubmissionError::NotFound(id))
    }

    pub async fn latest(&self) -> Result<Option<SubmissionRecord>, SubmissionError> {
        self.with_repository(|repository| repository.latest_result()).await
    }

    /// Storage calls block on SQLite I/O, so they run on the blocking pool.
    async fn with_repository<T, F>(&self, work: F) -> Result<T, SubmissionError>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T, StorageError> + Send + 'static,
    {
        let repository = Arc::clone(&self.repository);
        let value = tokio::task::spawn_blocking(move || work(&*repository)).await??;
        Ok(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("mental state model unavailable: {0}")]
    Prediction(#[from] PredictorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("submission {0} not found")]
    NotFound(i64),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
