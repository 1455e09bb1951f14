use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bincode::Options;
use tracing::debug;

use super::forest::ForestError;
use super::model::TrainedModel;
use super::schema::{FeatureSchema, SchemaMismatch, FEATURE_COUNT};

/// Upper bound on artifact size accepted by the decoder.
const MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("model artifact {path} is not accessible: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode model artifact: {0}")]
    Encode(#[source] bincode::Error),
    #[error("model artifact is corrupt: {0}")]
    Decode(#[source] bincode::Error),
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
    #[error("model artifact is malformed: {0}")]
    Invalid(#[source] ForestError),
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ARTIFACT_BYTES)
}

/// Load/save of the trained model at a fixed path.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Decodes the artifact and rejects it unless it was trained against the
    /// standard feature schema and its trees are well formed.
    pub fn load(&self) -> Result<TrainedModel, ArtifactError> {
        let bytes = fs::read(&self.path).map_err(|source| self.io_error(source))?;
        let model: TrainedModel = codec()
            .deserialize(&bytes)
            .map_err(ArtifactError::Decode)?;
        model.schema().ensure_matches(&FeatureSchema::standard())?;
        model
            .forest()
            .validate(FEATURE_COUNT)
            .map_err(ArtifactError::Invalid)?;
        Ok(model)
    }

    /// Writes to a sibling temp file then renames over the artifact, so readers
    /// only ever see a complete model.
    pub fn save(&self, model: &TrainedModel) -> Result<(), ArtifactError> {
        let bytes = codec().serialize(model).map_err(ArtifactError::Encode)?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let staging = self.staging_path();
        fs::write(&staging, &bytes).map_err(|source| self.io_error(source))?;
        if let Err(source) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(self.io_error(source));
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "model artifact written");
        Ok(())
    }

    pub fn discard(&self) -> Result<(), ArtifactError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }

    fn io_error(&self, source: std::io::Error) -> ArtifactError {
        ArtifactError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::forest::{ForestParams, RandomForest};
    use crate::prediction::schema::FeatureVector;
    use ndarray::{array, Array2};
    use serde::Serialize;

    fn tiny_model() -> TrainedModel {
        let x = Array2::from_shape_fn((6, 8), |(row, column)| (row + column) as f64);
        let y = array![10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let params = ForestParams {
            n_trees: 3,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(x.view(), y.view(), &params).expect("fit");
        TrainedModel::new(FeatureSchema::standard(), forest)
    }

    #[test]
    fn save_then_load_preserves_predictions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path().join("models").join("trained_model.bin"));
        let model = tiny_model();

        assert!(!store.exists());
        store.save(&model).expect("save");
        assert!(store.exists());

        let loaded = store.load().expect("load");
        let probe = FeatureVector::new([3.0; 8]);
        assert_eq!(loaded.predict(&probe), model.predict(&probe));
        assert_eq!(loaded, model);

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("models"))
            .expect("list")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn garbage_bytes_are_reported_as_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path().join("trained_model.bin"));
        fs::write(store.path(), b"definitely not a forest").expect("write");

        assert!(matches!(store.load(), Err(ArtifactError::Decode(_))));
    }

    #[test]
    fn artifact_for_another_schema_is_rejected() {
        #[derive(Serialize)]
        struct ForeignArtifact<'a> {
            columns: Vec<&'static str>,
            label: &'static str,
            forest: &'a RandomForest,
        }

        let model = tiny_model();
        let foreign = ForeignArtifact {
            columns: vec![
                "safety",
                "sunlight_hours",
                "sleep_duration_hours",
                "screen_time_minutes",
                "physical_activity_minutes",
                "daily_goal_progression",
                "hour",
                "weekday",
            ],
            label: "mental_state",
            forest: model.forest(),
        };

        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path().join("trained_model.bin"));
        fs::write(store.path(), codec().serialize(&foreign).expect("encode")).expect("write");

        assert!(matches!(store.load(), Err(ArtifactError::Schema(_))));
    }

    #[test]
    fn forest_for_a_narrower_row_is_rejected() {
        let x = Array2::from_shape_fn((6, 3), |(row, column)| (row * column) as f64);
        let y = array![10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let params = ForestParams {
            n_trees: 2,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(x.view(), y.view(), &params).expect("fit");
        let narrow = TrainedModel::new(FeatureSchema::standard(), forest);

        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path().join("trained_model.bin"));
        store.save(&narrow).expect("save");

        assert!(matches!(
            store.load(),
            Err(ArtifactError::Invalid(ForestError::FeatureCount {
                expected: 8,
                found: 3
            }))
        ));
    }

    #[test]
    fn discard_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path().join("trained_model.bin"));
        store.save(&tiny_model()).expect("save");

        store.discard().expect("first discard");
        store.discard().expect("second discard");
        assert!(!store.exists());
    }
}
