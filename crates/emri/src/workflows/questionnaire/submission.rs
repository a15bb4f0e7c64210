use super::domain::{AnswerMap, AnswerValue, DisplayMode};
use super::error::QuestionnaireError;
use super::gateway::InferenceGateway;
use super::wizard::SubmissionKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

/// JSON-string layers peeled off the response body before giving up.
const MAX_STRING_LAYERS: usize = 2;

/// Batch-of-one body expected by the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub instances: Vec<Vec<Value>>,
}

impl InferenceRequest {
    pub fn single(features: Vec<Value>) -> Self {
        Self {
            instances: vec![features],
        }
    }

    pub fn features(&self) -> &[Value] {
        self.instances.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Ordered feature vector in schema order.
///
/// A variable without an answer entry means the question model and the
/// payload disagree; that is reported instead of being zero-filled.
pub fn build_feature_vector(
    variable_order: &[String],
    answers: &AnswerMap,
) -> Result<Vec<Value>, QuestionnaireError> {
    variable_order
        .iter()
        .map(|variable| match answers.get(variable) {
            Some(Some(value)) => Ok(value.to_json()),
            Some(None) => Ok(Value::Null),
            None => Err(QuestionnaireError::MissingFeature(variable.clone())),
        })
        .collect()
}

/// Administrator payload: one slot per schema row, `null` where admin mode
/// holds no answer.
pub fn build_admin_feature_vector(variable_order: &[String], answers: &AnswerMap) -> Vec<Value> {
    variable_order
        .iter()
        .map(|variable| {
            answers
                .get(variable)
                .and_then(Option::as_ref)
                .map(AnswerValue::to_json)
                .unwrap_or(Value::Null)
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response body is not JSON: {0}")]
    Body(#[source] serde_json::Error),
    #[error("response is wrapped in too many layers of JSON strings")]
    TooDeep,
    #[error("response has no 'prediction' field")]
    MissingPrediction,
    #[error("'prediction' is not valid JSON: {0}")]
    PredictionNotJson(#[source] serde_json::Error),
    #[error("'prediction' has no predictions[0][0] entry")]
    MissingScore,
    #[error("predictions[0][0] is not a finite number")]
    NonNumericScore,
}

/// Extracts the score from the endpoint's loosely shaped envelope.
///
/// The body may itself be a JSON string, and `prediction` may be either an
/// object or a JSON string holding `{"predictions": [[score]]}`.
pub fn decode_prediction(body: &str) -> Result<f64, DecodeError> {
    let mut value: Value = serde_json::from_str(body).map_err(DecodeError::Body)?;
    for _ in 0..MAX_STRING_LAYERS {
        match value {
            Value::String(inner) => {
                value = serde_json::from_str(&inner).map_err(DecodeError::Body)?;
            }
            _ => break,
        }
    }
    if value.is_string() {
        return Err(DecodeError::TooDeep);
    }

    let prediction = value
        .get("prediction")
        .ok_or(DecodeError::MissingPrediction)?;
    let prediction = match prediction {
        Value::String(inner) => {
            serde_json::from_str::<Value>(inner).map_err(DecodeError::PredictionNotJson)?
        }
        other => other.clone(),
    };

    let score = prediction
        .get("predictions")
        .and_then(|rows| rows.get(0))
        .and_then(|row| row.get(0))
        .ok_or(DecodeError::MissingScore)?;

    score
        .as_f64()
        .filter(|score| score.is_finite())
        .ok_or(DecodeError::NonNumericScore)
}

/// Proficiency score returned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub score: f64,
    pub scored_at: DateTime<Utc>,
}

/// What the endpoint gave back for a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionReceipt {
    Scored(Prediction),
    /// Administrator payloads are recorded without a score.
    Recorded,
}

/// A prepared submission, safe to dispatch without holding the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionTicket {
    pub kind: SubmissionKind,
    pub mode: DisplayMode,
    pub endpoint: String,
    pub model: String,
    pub request: InferenceRequest,
}

impl SubmissionTicket {
    pub fn dispatch<G>(&self, gateway: &G) -> Result<SubmissionReceipt, QuestionnaireError>
    where
        G: InferenceGateway + ?Sized,
    {
        let started = Instant::now();
        info!(model = %self.model, endpoint = %self.endpoint, kind = ?self.kind, "calling inference endpoint");

        let body = gateway
            .predict(&self.endpoint, &self.model, &self.request)
            .map_err(QuestionnaireError::SubmissionNetworkFailure)?;

        if self.mode.is_admin() {
            info!(model = %self.model, "administrator answers recorded");
            return Ok(SubmissionReceipt::Recorded);
        }

        let score = decode_prediction(&body).map_err(|err| {
            warn!(model = %self.model, error = %err, "inference response rejected");
            QuestionnaireError::SubmissionDecodeFailure(err)
        })?;
        if !(0.0..=1.0).contains(&score) {
            warn!(score, "prediction outside the expected [0, 1] range");
        }

        info!(
            model = %self.model,
            score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference endpoint returned prediction"
        );

        Ok(SubmissionReceipt::Scored(Prediction {
            score,
            scored_at: Utc::now(),
        }))
    }
}
