use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::schema::{Feature, FeatureVector, FEATURE_COUNT, LABEL_COLUMN};

/// Labeled row used to fit the regressor.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub label: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read training dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("training dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("training dataset is not valid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("training dataset must be a JSON array of objects")]
    NotRecords,
    #[error("training dataset has no '{column}' column")]
    MissingHeader { column: &'static str },
    #[error("record {row} is missing column '{column}'")]
    MissingColumn { row: usize, column: &'static str },
    #[error("record {row} has a non-numeric value in column '{column}'")]
    InvalidValue { row: usize, column: &'static str },
    #[error("training dataset contains no records")]
    Empty,
}

/// Loads labeled examples, picking CSV or JSON from the file extension.
pub fn load_examples(path: &Path) -> Result<Vec<TrainingExample>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let is_csv = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));

    if is_csv {
        examples_from_csv(reader)
    } else {
        examples_from_json(reader)
    }
}

/// Parses a JSON array of records, each carrying every feature column and the label.
pub fn examples_from_json<R: Read>(reader: R) -> Result<Vec<TrainingExample>, DatasetError> {
    let document: Value = serde_json::from_reader(reader)?;
    let Value::Array(records) = document else {
        return Err(DatasetError::NotRecords);
    };

    let examples = records
        .iter()
        .enumerate()
        .map(|(row, record)| match record {
            Value::Object(fields) => example_from_object(row, fields),
            _ => Err(DatasetError::NotRecords),
        })
        .collect::<Result<Vec<_>, _>>()?;

    non_empty(examples)
}

pub fn examples_from_csv<R: Read>(reader: R) -> Result<Vec<TrainingExample>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let position = |column: &'static str| {
        headers
            .iter()
            .position(|header| header.trim_start_matches('\u{feff}') == column)
            .ok_or(DatasetError::MissingHeader { column })
    };

    let mut feature_positions = [0usize; FEATURE_COUNT];
    for feature in Feature::ALL {
        feature_positions[feature.index()] = position(feature.column())?;
    }
    let label_position = position(LABEL_COLUMN)?;

    let mut examples = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let cell = |index: usize, column: &'static str| -> Result<f64, DatasetError> {
            let raw = record
                .get(index)
                .ok_or(DatasetError::MissingColumn { row, column })?;
            finite(raw.parse::<f64>().ok()).ok_or(DatasetError::InvalidValue { row, column })
        };

        let mut features = FeatureVector::default();
        for feature in Feature::ALL {
            features.set(
                feature,
                cell(feature_positions[feature.index()], feature.column())?,
            );
        }
        let label = cell(label_position, LABEL_COLUMN)?;

        examples.push(TrainingExample { features, label });
    }

    non_empty(examples)
}

fn example_from_object(
    row: usize,
    fields: &Map<String, Value>,
) -> Result<TrainingExample, DatasetError> {
    let number = |column: &'static str| -> Result<f64, DatasetError> {
        let value = fields
            .get(column)
            .ok_or(DatasetError::MissingColumn { row, column })?;
        finite(value.as_f64()).ok_or(DatasetError::InvalidValue { row, column })
    };

    let mut features = FeatureVector::default();
    for feature in Feature::ALL {
        features.set(feature, number(feature.column())?);
    }

    Ok(TrainingExample {
        features,
        label: number(LABEL_COLUMN)?,
    })
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|number| number.is_finite())
}

fn non_empty(examples: Vec<TrainingExample>) -> Result<Vec<TrainingExample>, DatasetError> {
    if examples.is_empty() {
        Err(DatasetError::Empty)
    } else {
        Ok(examples)
    }
}
