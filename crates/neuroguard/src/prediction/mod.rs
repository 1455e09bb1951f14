//! Mental state prediction: input sanitising, random forest training and
//! bounded inference over a fixed feature schema.

mod artifact;
mod dataset;
mod forest;
mod model;
mod predictor;
mod sanitiser;
mod schema;
mod training;

pub use artifact::{ArtifactError, ArtifactStore};
pub use dataset::{
    examples_from_csv, examples_from_json, load_examples, DatasetError, TrainingExample,
};
pub use forest::{ForestError, ForestParams, RandomForest};
pub use model::{bounded_score, TrainedModel};
pub use predictor::{Prediction, Predictor, PredictorError, Readiness};
pub use sanitiser::{coerce_number, sanitise, DefaultReason, SanitisedInput};
pub use schema::{
    Feature, FeatureSchema, FeatureVector, SchemaMismatch, FEATURE_COUNT, LABEL_COLUMN,
};
pub use training::{
    mean_absolute_error, r2_score, split_examples, train, TrainingError, ValidationReport,
};
