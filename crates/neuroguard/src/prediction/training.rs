use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use tracing::debug;

use super::dataset::TrainingExample;
use super::forest::{ForestError, ForestParams, RandomForest};
use super::model::TrainedModel;
use super::schema::{FeatureSchema, FEATURE_COUNT};

pub const VALIDATION_FRACTION: f64 = 0.2;
pub const SPLIT_SEED: u64 = 42;

/// Held-out diagnostics from a training run. Never gates persistence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationReport {
    pub training_rows: usize,
    pub validation_rows: usize,
    pub mae: f64,
    /// Absent when fewer than two validation rows exist.
    pub r2: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("at least 2 training examples are required, found {rows}")]
    InsufficientData { rows: usize },
    #[error(transparent)]
    Forest(#[from] ForestError),
}

/// Shuffles with a fixed seed and holds out `ceil(fraction * n)` rows, always
/// leaving at least one row to train on.
pub fn split_examples(
    examples: &[TrainingExample],
    fraction: f64,
    seed: u64,
) -> Result<(Vec<&TrainingExample>, Vec<&TrainingExample>), TrainingError> {
    let rows = examples.len();
    if rows < 2 {
        return Err(TrainingError::InsufficientData { rows });
    }

    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut Pcg64::seed_from_u64(seed));

    let validation_rows = ((rows as f64 * fraction).ceil() as usize).clamp(1, rows - 1);
    let (validation, training) = order.split_at(validation_rows);

    Ok((
        training.iter().map(|&index| &examples[index]).collect(),
        validation.iter().map(|&index| &examples[index]).collect(),
    ))
}

pub fn train(
    examples: &[TrainingExample],
    params: &ForestParams,
) -> Result<(TrainedModel, ValidationReport), TrainingError> {
    let (training, validation) = split_examples(examples, VALIDATION_FRACTION, SPLIT_SEED)?;
    debug!(
        training_rows = training.len(),
        validation_rows = validation.len(),
        n_trees = params.n_trees,
        "fitting random forest"
    );

    let (x, y) = design_matrix(&training);
    let forest = RandomForest::fit(x.view(), y.view(), params)?;
    let model = TrainedModel::new(FeatureSchema::standard(), forest);

    let truth: Vec<f64> = validation.iter().map(|example| example.label).collect();
    let predicted: Vec<f64> = validation
        .iter()
        .map(|example| model.predict(&example.features))
        .collect();

    let report = ValidationReport {
        training_rows: training.len(),
        validation_rows: validation.len(),
        mae: mean_absolute_error(&truth, &predicted),
        r2: r2_score(&truth, &predicted),
    };

    Ok((model, report))
}

fn design_matrix(examples: &[&TrainingExample]) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((examples.len(), FEATURE_COUNT), |(row, column)| {
        examples[row].features.as_slice()[column]
    });
    let y = examples.iter().map(|example| example.label).collect();
    (x, y)
}

pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }

    let total: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(actual, guess)| (actual - guess).abs())
        .sum();
    total / truth.len() as f64
}

/// Coefficient of determination. A constant target scores 1.0 when matched
/// exactly and 0.0 otherwise.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    if truth.len() < 2 {
        return None;
    }

    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let residual: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(actual, guess)| (actual - guess).powi(2))
        .sum();
    let total: f64 = truth.iter().map(|actual| (actual - mean).powi(2)).sum();

    if total == 0.0 {
        return Some(if residual == 0.0 { 1.0 } else { 0.0 });
    }

    Some(1.0 - residual / total)
}
