use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_submission_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use neuroguard::config::AppConfig;
use neuroguard::error::AppError;
use neuroguard::prediction::{Predictor, Readiness};
use neuroguard::submissions::{SqliteSubmissionRepository, SubmissionService};
use neuroguard::telemetry;
use neuroguard::wellness::WellnessAdvisor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // Load or train before serving so no request pays for training.
    let predictor = Arc::new(Predictor::from_config(&config.model));
    match predictor.ensure_ready()? {
        Readiness::Trained(report) => info!(
            mae = report.mae,
            r2 = ?report.r2,
            path = %predictor.artifact_path().display(),
            "trained mental state model at startup"
        ),
        Readiness::Loaded | Readiness::AlreadyLoaded => {}
    }

    let repository = Arc::new(SqliteSubmissionRepository::open(
        &config.storage.database_path,
    )?);
    let advisor = WellnessAdvisor::from_config(&config.advisor);
    let submission_service = Arc::new(SubmissionService::new(predictor, repository, advisor));

    let app = with_submission_routes(submission_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "neuroguard ready");

    axum::serve(listener, app).await?;
    Ok(())
}
