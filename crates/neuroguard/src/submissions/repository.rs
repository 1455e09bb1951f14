use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::prediction::FeatureVector;

pub const DEFAULT_USER: &str = "default_user";

/// One stored form submission and, once scored, its result.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub id: i64,
    pub user: String,
    pub metrics: FeatureVector,
    pub mental_state: Option<u8>,
    pub suggestion: Option<String>,
    /// Condensed advice fed back into later prompts.
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn view(&self) -> SubmissionView {
        SubmissionView {
            submission_id: self.id,
            user: self.user.clone(),
            mental_state: self.mental_state,
            suggestion: self.suggestion.clone(),
            summary: self.summary.clone(),
            metrics: self
                .metrics
                .iter()
                .map(|(feature, value)| (feature.column(), value))
                .collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub submission_id: i64,
    pub user: String,
    pub mental_state: Option<u8>,
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub metrics: BTreeMap<&'static str, f64>,
    pub created_at: DateTime<Utc>,
}

/// Storage abstraction so the submission service can run against any backend.
pub trait SubmissionRepository: Send + Sync {
    fn insert(&self, user: &str, metrics: &FeatureVector) -> Result<i64, StorageError>;
    fn record_result(
        &self,
        id: i64,
        mental_state: u8,
        suggestion: &str,
        summary: &str,
    ) -> Result<(), StorageError>;
    fn fetch(&self, id: i64) -> Result<Option<SubmissionRecord>, StorageError>;
    /// Most recent submission that has been scored.
    fn latest_result(&self) -> Result<Option<SubmissionRecord>, StorageError>;
    /// Stored advice summaries, oldest first.
    fn history(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("submission {0} not found")]
    NotFound(i64),
    #[error("submission store unavailable: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored timestamp is invalid: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("cannot create database directory {path}: {source}")]
    Directory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
