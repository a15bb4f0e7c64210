use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use serde_json::Value;

use crate::workflows::questionnaire::gateway::{DocumentSource, GatewayError, InferenceGateway};
use crate::workflows::questionnaire::router::SharedSession;
use crate::workflows::questionnaire::session::{QuestionnaireSession, SessionSettings};
use crate::workflows::questionnaire::submission::InferenceRequest;

pub(super) const CONFIG_URL: &str = "https://sheets.test/config";
pub(super) const US_SCHEMA_URL: &str = "https://sheets.test/us-schema";
pub(super) const US_METRICS_URL: &str = "https://sheets.test/us-metrics";
pub(super) const KE_SCHEMA_URL: &str = "https://sheets.test/ke-schema";
pub(super) const INFERENCE_URL: &str = "https://inference.test/predict";
pub(super) const ADMIN_URL: &str = "https://inference.test/admin";

pub(super) const COUNTRY_CONFIG: &str = r#"{"United States": {"model": "us-model.tar.gz", "csv": "https://sheets.test/us-schema", "metrics": "https://sheets.test/us-metrics", "notebook": "https://notebooks.test/us", "cutoff": 0.5}, "Kenya": {"model": "ke-model.tar.gz", "csv": "https://sheets.test/ke-schema", "cutoff": 0.4}}"#;

/// Two visible respondent questions, one hidden row, one admin-only row.
pub(super) const US_SCHEMA: &str = r#"Variable_name,Variable_context,Variable_label,Variable_answers,Hide,Hidden_Value,Admin_Only,Recommendation_Threshold,Recommended_Intervention
ST001,Home,Books at home,"[{""value"":1,""text"":""None""},{""value"":2,""text"":""Few""},{""value"":3,""text"":""Many""}]",,,,< 2,<b>Read together</b>
ST002,,Siblings,,Yes,4,,,
ST003,,Hours of homework,"{""range"":{""min"":2,""max"":10,""step"":1}}",,,,> 8,Check pacing
AD001,,School size,"[{""value"":""small"",""text"":""Small""},{""value"":""large"",""text"":""Large""}]",Yes,0,Yes,,
"#;

pub(super) const KE_SCHEMA: &str = r#"Variable_name,Variable_context,Variable_label,Variable_answers,Hide,Hidden_Value,Admin_Only,Recommendation_Threshold,Recommended_Intervention
KE001,,Distance to school,"{""range"":{""min"":0,""max"":20}}",,,,,
"#;

pub(super) const US_METRICS: &str = "accuracy,recall\n0.82,0.77\n";

pub(super) fn prediction_body(score: f64) -> String {
    serde_json::json!({
        "prediction": serde_json::json!({ "predictions": [[score]] }).to_string()
    })
    .to_string()
}

#[derive(Debug, Default)]
pub(super) struct MemoryDocuments {
    documents: Mutex<HashMap<String, String>>,
    fetched: Mutex<Vec<String>>,
}

impl MemoryDocuments {
    pub(super) fn seeded() -> Self {
        let documents = Self::default();
        documents.put(CONFIG_URL, COUNTRY_CONFIG);
        documents.put(US_SCHEMA_URL, US_SCHEMA);
        documents.put(US_METRICS_URL, US_METRICS);
        documents.put(KE_SCHEMA_URL, KE_SCHEMA);
        documents
    }

    pub(super) fn put(&self, url: &str, body: &str) {
        self.documents
            .lock()
            .expect("documents lock")
            .insert(url.to_string(), body.to_string());
    }

    pub(super) fn remove(&self, url: &str) {
        self.documents.lock().expect("documents lock").remove(url);
    }

    pub(super) fn fetch_count(&self, url: &str) -> usize {
        self.fetched
            .lock()
            .expect("fetched lock")
            .iter()
            .filter(|fetched| fetched.as_str() == url)
            .count()
    }
}

impl DocumentSource for MemoryDocuments {
    fn fetch_text(&self, url: &str) -> Result<String, GatewayError> {
        self.fetched
            .lock()
            .expect("fetched lock")
            .push(url.to_string());
        self.documents
            .lock()
            .expect("documents lock")
            .get(url)
            .cloned()
            .ok_or_else(|| GatewayError::Unavailable(url.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct RecordedCall {
    pub(super) endpoint: String,
    pub(super) model: String,
    pub(super) request: InferenceRequest,
}

/// Answers calls from a queue; an empty queue means the endpoint is down.
#[derive(Debug, Default)]
pub(super) struct ScriptedInference {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedInference {
    /// Every later call blocks this long before answering.
    pub(super) fn answer_after(&self, latency: Duration) {
        *self.latency.lock().expect("latency lock") = Some(latency);
    }

    pub(super) fn respond_with(&self, body: impl Into<String>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(body.into());
    }

    pub(super) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl InferenceGateway for ScriptedInference {
    fn predict(
        &self,
        endpoint: &str,
        model: &str,
        request: &InferenceRequest,
    ) -> Result<String, GatewayError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            request: request.clone(),
        });
        let latency = *self.latency.lock().expect("latency lock");
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or_else(|| GatewayError::Unavailable(endpoint.to_string()))
    }
}

pub(super) fn settings() -> SessionSettings {
    SessionSettings {
        country_config_url: CONFIG_URL.to_string(),
        inference_url: INFERENCE_URL.to_string(),
        admin_inference_url: ADMIN_URL.to_string(),
        default_country: "United States".to_string(),
    }
}

pub(super) struct Harness {
    pub(super) documents: Arc<MemoryDocuments>,
    pub(super) inference: Arc<ScriptedInference>,
    pub(super) session: QuestionnaireSession,
}

pub(super) fn harness() -> Harness {
    let documents = Arc::new(MemoryDocuments::seeded());
    let inference = Arc::new(ScriptedInference::default());
    let session = QuestionnaireSession::new(settings(), documents.clone(), inference.clone());
    Harness {
        documents,
        inference,
        session,
    }
}

/// Loaded session with the disclaimer accepted.
pub(super) fn ready_harness() -> Harness {
    let mut harness = harness();
    harness.session.load().expect("session loads");
    harness
        .session
        .accept_disclaimer()
        .expect("disclaimer accepted");
    harness
}

pub(super) fn shared(harness: Harness) -> (SharedSession, Arc<MemoryDocuments>, Arc<ScriptedInference>) {
    let Harness {
        documents,
        inference,
        session,
    } = harness;
    (Arc::new(Mutex::new(session)), documents, inference)
}

pub(super) fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
