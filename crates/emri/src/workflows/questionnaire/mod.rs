//! Dynamic-schema questionnaire: schema ingestion, question model, wizard,
//! inference submission and recommendations.
//!
//! [`QuestionnaireSession`] owns the application state and is the entry point
//! for every user-initiated operation. Remote collaborators are reached
//! through the [`DocumentSource`] and [`InferenceGateway`] traits.

pub mod country;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod recommendations;
pub mod router;
pub mod schema;
pub mod session;
pub mod submission;
pub mod threshold;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use country::{CountryConfigError, CountryDirectory, CountryProfile, DEFAULT_COUNTRY};
pub use domain::{
    AnswerMap, AnswerOptions, AnswerValue, ChoiceOption, DisplayMode, QuestionDefinition,
    RangeOptions,
};
pub use error::QuestionnaireError;
pub use gateway::{DocumentSource, GatewayError, HttpGateway, InferenceGateway};
pub use metrics::{MetricValue, ModelMetrics};
pub use model::{QuestionModel, SchemaStats};
pub use recommendations::{flagged_questions, FlaggedQuestion, ResultView, Verdict};
pub use router::{questionnaire_router, SharedSession};
pub use schema::{ParsedSchema, RawRow, SchemaError, SchemaParser, SchemaRowParseFailure};
pub use session::{
    QuestionnaireSession, ReviewEntry, SchemaOrigin, SessionSettings, SessionSnapshot,
    SubmissionOutcome, DISCLAIMER,
};
pub use submission::{InferenceRequest, Prediction, SubmissionReceipt, SubmissionTicket};
pub use threshold::check_threshold;
pub use wizard::{NavigationAction, SubmissionKind, WizardError, WizardPhase, WizardState};
