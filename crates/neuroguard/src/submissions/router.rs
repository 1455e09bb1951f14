use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};

use super::repository::{SubmissionRepository, SubmissionView};
use super::service::{SubmissionService, RESULTS_REDIRECT};
use crate::error::AppError;
use crate::wellness::AdviceSource;

pub const NO_RESULT_SUGGESTION: &str = "Submit your data to get results.";

/// Router builder exposing the prediction and submission endpoints.
pub fn submission_router<R>(service: Arc<SubmissionService<R>>) -> Router
where
    R: SubmissionRepository + 'static,
{
    Router::new()
        .route("/api/v1/predict", post(predict_handler::<R>))
        .route("/api/v1/submissions", post(submit_handler::<R>))
        .route("/api/v1/submissions/:submission_id", get(fetch_handler::<R>))
        .route("/api/v1/results/latest", get(latest_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Serialize)]
pub(crate) struct PredictionResponse {
    mental_state: u8,
    raw_score: f64,
    trained_now: bool,
    defaulted_fields: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    ok: bool,
    submission_id: i64,
    mental_state: u8,
    suggestion: String,
    advice_source: AdviceSource,
    defaulted_fields: Vec<&'static str>,
    redirect: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LatestResultResponse {
    mental_state: u8,
    suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_id: Option<i64>,
}

/// Non-object bodies are treated as an empty feature map.
fn into_fields(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub(crate) async fn predict_handler<R>(
    State(service): State<Arc<SubmissionService<R>>>,
    Json(payload): Json<Value>,
) -> Result<Json<PredictionResponse>, AppError>
where
    R: SubmissionRepository + 'static,
{
    let prediction = service.predict(into_fields(payload)).await?;
    Ok(Json(PredictionResponse {
        mental_state: prediction.score,
        raw_score: prediction.raw_score,
        trained_now: prediction.trained_now,
        defaulted_fields: prediction.defaulted_fields,
    }))
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<SubmissionService<R>>>,
    Json(payload): Json<Value>,
) -> Result<Json<SubmissionResponse>, AppError>
where
    R: SubmissionRepository + 'static,
{
    let outcome = service.submit(into_fields(payload)).await?;
    Ok(Json(SubmissionResponse {
        ok: true,
        submission_id: outcome.submission_id,
        mental_state: outcome.mental_state,
        suggestion: outcome.suggestion,
        advice_source: outcome.advice_source,
        defaulted_fields: outcome.defaulted_fields,
        redirect: RESULTS_REDIRECT,
    }))
}

pub(crate) async fn fetch_handler<R>(
    State(service): State<Arc<SubmissionService<R>>>,
    Path(submission_id): Path<i64>,
) -> Result<Json<SubmissionView>, AppError>
where
    R: SubmissionRepository + 'static,
{
    let record = service.get(submission_id).await?;
    Ok(Json(record.view()))
}

pub(crate) async fn latest_handler<R>(
    State(service): State<Arc<SubmissionService<R>>>,
) -> Result<Json<LatestResultResponse>, AppError>
where
    R: SubmissionRepository + 'static,
{
    let response = match service.latest().await? {
        Some(record) => LatestResultResponse {
            mental_state: record.mental_state.unwrap_or_default(),
            suggestion: record
                .suggestion
                .unwrap_or_else(|| NO_RESULT_SUGGESTION.to_string()),
            submission_id: Some(record.id),
        },
        None => LatestResultResponse {
            mental_state: 0,
            suggestion: NO_RESULT_SUGGESTION.to_string(),
            submission_id: None,
        },
    };
    Ok(Json(response))
}
