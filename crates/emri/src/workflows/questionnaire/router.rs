use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinError;
use tracing::{error, warn};

use super::domain::{AnswerValue, DisplayMode};
use super::error::QuestionnaireError;
use super::session::QuestionnaireSession;
use super::wizard::{NavigationAction, WizardError};

/// The single respondent session shared by every handler.
pub type SharedSession = Arc<Mutex<QuestionnaireSession>>;

/// HTTP surface over one [`QuestionnaireSession`].
///
/// Remote fetches and inference calls run on the blocking pool. Submissions
/// release the session while the endpoint is called so that snapshots keep
/// answering and duplicate submits are refused.
pub fn questionnaire_router(session: SharedSession) -> Router {
    Router::new()
        .route("/api/v1/questionnaire", get(snapshot_handler))
        .route("/api/v1/questionnaire/country", post(country_handler))
        .route("/api/v1/questionnaire/mode", post(mode_handler))
        .route("/api/v1/questionnaire/debug", post(debug_handler))
        .route("/api/v1/questionnaire/schema", put(schema_handler))
        .route("/api/v1/questionnaire/disclaimer", post(disclaimer_handler))
        .route(
            "/api/v1/questionnaire/answers/:variable",
            put(answer_handler),
        )
        .route("/api/v1/questionnaire/navigation", post(navigation_handler))
        .route("/api/v1/questionnaire/submit", post(submit_handler))
        .route("/api/v1/questionnaire/start-over", post(start_over_handler))
        .with_state(session)
}

#[derive(Debug, Deserialize)]
struct CountryRequest {
    country: String,
}

#[derive(Debug, Deserialize)]
struct ModeRequest {
    mode: DisplayMode,
}

#[derive(Debug, Deserialize)]
struct DebugRequest {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    value: AnswerValue,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Session(QuestionnaireError),
    Poisoned,
    Worker(JoinError),
}

impl From<QuestionnaireError> for ApiError {
    fn from(value: QuestionnaireError) -> Self {
        Self::Session(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Session(err) => (status_for(&err), err.to_string()),
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "questionnaire session is unavailable".to_string(),
            ),
            ApiError::Worker(err) => {
                error!(error = %err, "questionnaire worker failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "questionnaire worker failed".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// HTTP status for a session failure: 502 for collaborators, 4xx for callers.
pub fn status_for(error: &QuestionnaireError) -> StatusCode {
    if error.is_upstream() {
        return StatusCode::BAD_GATEWAY;
    }

    match error {
        QuestionnaireError::Wizard(WizardError::DisclaimerPending) => StatusCode::FORBIDDEN,
        QuestionnaireError::Wizard(_)
        | QuestionnaireError::NotLoaded
        | QuestionnaireError::NoCountrySelected => StatusCode::CONFLICT,
        QuestionnaireError::UnknownCountry(_) | QuestionnaireError::UnknownVariable(_) => {
            StatusCode::NOT_FOUND
        }
        QuestionnaireError::InvalidAnswer { .. } | QuestionnaireError::UploadUnreadable(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn lock(session: &SharedSession) -> Result<MutexGuard<'_, QuestionnaireSession>, ApiError> {
    session.lock().map_err(|_| ApiError::Poisoned)
}

/// Runs `operation` on the blocking pool and answers with the new snapshot.
async fn apply<F>(session: SharedSession, operation: F) -> Result<Json<Value>, ApiError>
where
    F: FnOnce(&mut QuestionnaireSession) -> Result<(), QuestionnaireError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = lock(&session)?;
        operation(&mut guard)?;
        Ok(Json(json!(guard.snapshot())))
    })
    .await
    .map_err(ApiError::Worker)?
}

async fn snapshot_handler(State(session): State<SharedSession>) -> Result<Json<Value>, ApiError> {
    apply(session, |_| Ok(())).await
}

async fn country_handler(
    State(session): State<SharedSession>,
    Json(request): Json<CountryRequest>,
) -> Result<Json<Value>, ApiError> {
    apply(session, move |session| session.select_country(&request.country)).await
}

async fn mode_handler(
    State(session): State<SharedSession>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<Value>, ApiError> {
    apply(session, move |session| session.set_mode(request.mode)).await
}

async fn debug_handler(
    State(session): State<SharedSession>,
    Json(request): Json<DebugRequest>,
) -> Result<Json<Value>, ApiError> {
    apply(session, move |session| session.set_debug(request.enabled)).await
}

async fn schema_handler(
    State(session): State<SharedSession>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    apply(session, move |session| session.install_schema(&body).map(|_| ())).await
}

async fn disclaimer_handler(
    State(session): State<SharedSession>,
) -> Result<Json<Value>, ApiError> {
    apply(session, |session| session.accept_disclaimer()).await
}

async fn answer_handler(
    State(session): State<SharedSession>,
    Path(variable): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<Value>, ApiError> {
    apply(session, move |session| {
        session.set_answer(&variable, request.value)
    })
    .await
}

async fn navigation_handler(
    State(session): State<SharedSession>,
    Json(action): Json<NavigationAction>,
) -> Result<Json<Value>, ApiError> {
    apply(session, move |session| session.navigate(action).map(|_| ())).await
}

async fn start_over_handler(
    State(session): State<SharedSession>,
) -> Result<Json<Value>, ApiError> {
    apply(session, |session| session.start_over()).await
}

async fn submit_handler(State(session): State<SharedSession>) -> Result<Json<Value>, ApiError> {
    // The blocking task outlives a cancelled request, so the submission always settles.
    tokio::task::spawn_blocking(move || run_submission(&session))
        .await
        .map_err(ApiError::Worker)?
}

/// Prepare under the lock, call the endpoint without it, complete under it again.
fn run_submission(session: &SharedSession) -> Result<Json<Value>, ApiError> {
    let (ticket, gateway) = {
        let mut guard = lock(session)?;
        let ticket = guard.prepare_submission()?;
        (ticket, guard.inference_gateway())
    };
    let pending = PendingSubmission { session, settled: false };

    let outcome = ticket.dispatch(gateway.as_ref());

    let mut guard = lock(session)?;
    let completed = guard.complete_submission(&ticket, outcome);
    pending.settle();
    let outcome = completed?;
    Ok(Json(json!({ "outcome": outcome, "session": guard.snapshot() })))
}

/// Clears the in-flight flag if a submission unwinds before completing.
struct PendingSubmission<'a> {
    session: &'a SharedSession,
    settled: bool,
}

impl PendingSubmission<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.session.lock() {
            Ok(mut guard) => guard.abort_submission(),
            Err(poisoned) => poisoned.into_inner().abort_submission(),
        }
        warn!("submission abandoned before completing");
    }
}
