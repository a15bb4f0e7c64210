use super::country::CountryConfigError;
use super::gateway::GatewayError;
use super::schema::SchemaError;
use super::submission::DecodeError;
use super::wizard::WizardError;

/// Failure surfaced by a questionnaire session operation.
///
/// Every variant leaves the session exactly as it was before the operation,
/// so the triggering user action can simply be retried.
#[derive(Debug, thiserror::Error)]
pub enum QuestionnaireError {
    #[error("failed to fetch questionnaire schema from {url}: {source}")]
    SchemaFetchFailure {
        url: String,
        #[source]
        source: GatewayError,
    },
    #[error("questionnaire schema is unreadable: {0}")]
    SchemaUnreadable(#[from] SchemaError),
    #[error("uploaded schema is unreadable: {0}")]
    UploadUnreadable(#[source] SchemaError),
    #[error("failed to fetch country configuration from {url}: {source}")]
    ConfigFetchFailure {
        url: String,
        #[source]
        source: GatewayError,
    },
    #[error("country configuration is malformed: {0}")]
    ConfigParseFailure(#[from] CountryConfigError),
    #[error("inference request failed: {0}")]
    SubmissionNetworkFailure(#[source] GatewayError),
    #[error("inference response could not be decoded: {0}")]
    SubmissionDecodeFailure(#[from] DecodeError),
    #[error("answer missing for payload variable '{0}'")]
    MissingFeature(String),
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error("unknown country '{0}'")]
    UnknownCountry(String),
    #[error("no country is selected")]
    NoCountrySelected,
    #[error("no visible question for variable '{0}'")]
    UnknownVariable(String),
    #[error("'{value}' is not a valid answer for '{variable}'")]
    InvalidAnswer { variable: String, value: String },
    #[error("no questionnaire schema is loaded")]
    NotLoaded,
}

impl QuestionnaireError {
    /// Whether the failure came from an external collaborator rather than the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            QuestionnaireError::SchemaFetchFailure { .. }
                | QuestionnaireError::SchemaUnreadable(_)
                | QuestionnaireError::ConfigFetchFailure { .. }
                | QuestionnaireError::ConfigParseFailure(_)
                | QuestionnaireError::SubmissionNetworkFailure(_)
                | QuestionnaireError::SubmissionDecodeFailure(_)
        )
    }
}
