use clap::Args;
use neuroguard::config::AppConfig;
use neuroguard::error::AppError;
use neuroguard::prediction::{Prediction, Predictor, ValidationReport};
use neuroguard::telemetry;
use serde_json::{Map, Value};
use std::io;

#[derive(Args, Debug)]
pub(crate) struct PredictArgs {
    /// JSON object of feature values, e.g. '{"sleep_duration_hours": 7}'
    #[arg(long)]
    pub(crate) input: String,
}

pub(crate) fn run_train() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let predictor = Predictor::from_config(&config.model);
    let report = predictor.retrain()?;

    println!(
        "Model retrained and saved to {}",
        predictor.artifact_path().display()
    );
    println!("{}", render_report(&report));
    Ok(())
}

pub(crate) fn run_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let raw = parse_input(&args.input)?;
    let predictor = Predictor::from_config(&config.model);
    let prediction = predictor.predict(&raw)?;

    println!("{}", render_prediction(&prediction));
    Ok(())
}

fn parse_input(input: &str) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(invalid_input("--input must be a JSON object")),
        Err(err) => Err(invalid_input(format!("--input is not valid JSON: {err}"))),
    }
}

fn invalid_input(message: impl Into<String>) -> AppError {
    AppError::Io(io::Error::new(io::ErrorKind::InvalidInput, message.into()))
}

fn render_report(report: &ValidationReport) -> String {
    let r2 = report
        .r2
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Validation MAE: {:.2}  |  R²: {}  ({} training rows, {} validation rows)",
        report.mae, r2, report.training_rows, report.validation_rows
    )
}

fn render_prediction(prediction: &Prediction) -> String {
    let mut lines = vec![format!("Mental state: {}/100", prediction.score)];
    if prediction.trained_now {
        lines.push("Model was trained for this prediction.".to_string());
    }
    if !prediction.defaulted_fields.is_empty() {
        lines.push(format!(
            "Defaulted to 0: {}",
            prediction.defaulted_fields.join(", ")
        ));
    }
    lines.join("\n")
}
