use emri::workflows::questionnaire::{
    GatewayError, HttpGateway, QuestionnaireSession, SessionSettings,
    SharedSession,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Session wired to the live HTTP collaborators, plus whether its first load
/// succeeded. Runs blocking I/O, so call it from the blocking pool.
pub(crate) fn build_session(
    settings: SessionSettings,
    timeout: Duration,
) -> Result<(SharedSession, bool), GatewayError> {
    let gateway = Arc::new(HttpGateway::new(timeout)?);
    let mut session = QuestionnaireSession::new(settings, gateway.clone(), gateway);
    let loaded = initial_load(&mut session);
    Ok((Arc::new(Mutex::new(session)), loaded))
}

/// A failed first load leaves the service up; the next country selection retries.
pub(crate) fn initial_load(session: &mut QuestionnaireSession) -> bool {
    match session.load() {
        Ok(()) => {
            info!(
                country = session.country().unwrap_or_default(),
                questions = session.questions().len(),
                "questionnaire loaded"
            );
            true
        }
        Err(err) => {
            warn!(error = %err, "initial questionnaire load failed");
            false
        }
    }
}
