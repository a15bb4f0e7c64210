use crate::cli::ServeArgs;
use crate::infra::{build_session, AppState};
use crate::routes::with_questionnaire_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use emri::config::AppConfig;
use emri::error::AppError;
use emri::telemetry;
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

    telemetry::init(&config.telemetry, config.environment)?;

    let settings = config.questionnaire.session_settings()?;
    let timeout = config.questionnaire.http_timeout;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // The blocking HTTP client must not be created on a runtime thread.
    let (session, loaded) = tokio::task::spawn_blocking(move || build_session(settings, timeout))
        .await
        .map_err(std::io::Error::other)??;

    let app = with_questionnaire_routes(session)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, loaded, "emri questionnaire service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
