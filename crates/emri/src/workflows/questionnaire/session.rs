use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::country::{CountryConfigError, CountryDirectory, CountryProfile};
use super::domain::{AnswerMap, AnswerOptions, AnswerValue, DisplayMode, QuestionDefinition};
use super::error::QuestionnaireError;
use super::gateway::{DocumentSource, InferenceGateway};
use super::metrics::ModelMetrics;
use super::model::{QuestionModel, SchemaStats};
use super::recommendations::ResultView;
use super::schema::{ParsedSchema, RawRow, SchemaParser, SchemaRowParseFailure};
use super::submission::{
    build_admin_feature_vector, build_feature_vector, InferenceRequest, Prediction,
    SubmissionReceipt, SubmissionTicket,
};
use super::wizard::{
    NavigationAction, SubmissionKind, WizardController, WizardError, WizardPhase, WizardState,
};

/// Shown until the respondent accepts it; every wizard action waits on it.
pub const DISCLAIMER: &str = "This tool was developed using publicly available data from the \
2022 Programme for International Student Assessment (PISA) and is intended for exploratory and \
educational use only. Predictions generated by this tool should not be interpreted as definitive \
assessments of student ability. They are based on statistical models trained on international \
survey data and are intended to provide general guidance and insight. No personal information is \
stored when using this tool. By agreeing, you acknowledge that you understand the limitations of \
this tool and agree to use it accordingly.";

/// Endpoints and defaults a session is wired to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub country_config_url: String,
    pub inference_url: String,
    pub admin_inference_url: String,
    pub default_country: String,
}

/// Where the loaded schema came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaOrigin {
    Remote { country: String, url: String },
    /// Supplied directly instead of fetched.
    Uploaded,
}

#[derive(Debug)]
struct LoadedSchema {
    origin: SchemaOrigin,
    rows: Vec<RawRow>,
    issues: Vec<SchemaRowParseFailure>,
    model: QuestionModel,
    answers: AnswerMap,
    wizard: WizardController,
}

impl LoadedSchema {
    fn new(origin: SchemaOrigin, parsed: ParsedSchema, mode: DisplayMode) -> Self {
        let model = QuestionModel::build(&parsed.rows, mode);
        let answers = model.defaults.clone();
        let wizard = WizardController::new(model.len());
        Self {
            origin,
            rows: parsed.rows,
            issues: parsed.issues,
            model,
            answers,
            wizard,
        }
    }

    fn with_disclaimer(mut self, accepted: bool) -> Self {
        if accepted {
            self.wizard.accept_disclaimer();
        }
        self
    }

    fn parsed(&self) -> ParsedSchema {
        ParsedSchema {
            rows: self.rows.clone(),
            issues: self.issues.clone(),
        }
    }

    /// Adopts a re-fetched schema, keeping answers for variables that survive.
    fn refresh(&mut self, origin: SchemaOrigin, parsed: ParsedSchema, mode: DisplayMode) {
        let model = QuestionModel::build(&parsed.rows, mode);
        let mut answers = model.defaults.clone();
        for (variable, value) in answers.iter_mut() {
            if let Some(previous) = self.answers.get(variable) {
                *value = previous.clone();
            }
        }

        self.wizard.rebind(model.len());
        self.origin = origin;
        self.rows = parsed.rows;
        self.issues = parsed.issues;
        self.model = model;
        self.answers = answers;
    }
}

/// Result of a finished submission round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub kind: SubmissionKind,
    #[serde(flatten)]
    pub phase: WizardPhase,
    pub receipt: SubmissionReceipt,
}

/// One line of the review table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewEntry {
    pub step: usize,
    pub variable: String,
    pub prompt: String,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentQuestion {
    pub step: usize,
    #[serde(flatten)]
    pub question: QuestionDefinition,
    pub answer: Option<AnswerValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSummary {
    pub origin: SchemaOrigin,
    pub stats: SchemaStats,
    pub issues: Vec<SchemaRowParseFailure>,
}

/// Internals exposed only while debug mode is on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugView {
    pub variable_order: Vec<String>,
    pub answers: AnswerMap,
    pub model: Option<String>,
    pub notebook: Option<String>,
    pub score: Option<f64>,
    pub cutoff: Option<f64>,
}

/// Serializable view of everything the rendering surface needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub title: &'static str,
    pub countries: Vec<String>,
    pub country: Option<String>,
    pub mode: DisplayMode,
    pub debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<&'static str>,
    pub wizard: Option<WizardState>,
    pub progress: Option<Progress>,
    pub question: Option<CurrentQuestion>,
    pub can_resubmit: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub review: Vec<ReviewEntry>,
    pub result: Option<ResultView>,
    pub metrics: ModelMetrics,
    pub schema: Option<SchemaSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugView>,
}

/// Application state for one respondent, injected with its gateways.
///
/// Every operation either applies completely or returns an error with the
/// session untouched. Remote fetches are performed before any field changes.
#[derive(Debug)]
pub struct QuestionnaireSession {
    settings: SessionSettings,
    documents: Arc<dyn DocumentSource>,
    inference: Arc<dyn InferenceGateway>,
    countries: CountryDirectory,
    country: Option<String>,
    mode: DisplayMode,
    debug: bool,
    schema: Option<LoadedSchema>,
    receipt: Option<SubmissionReceipt>,
    metrics: ModelMetrics,
}

impl QuestionnaireSession {
    pub fn new(
        settings: SessionSettings,
        documents: Arc<dyn DocumentSource>,
        inference: Arc<dyn InferenceGateway>,
    ) -> Self {
        Self {
            settings,
            documents,
            inference,
            countries: CountryDirectory::default(),
            country: None,
            mode: DisplayMode::default(),
            debug: false,
            schema: None,
            receipt: None,
            metrics: ModelMetrics::default(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn inference_gateway(&self) -> Arc<dyn InferenceGateway> {
        Arc::clone(&self.inference)
    }

    pub fn countries(&self) -> &CountryDirectory {
        &self.countries
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn profile(&self) -> Option<&CountryProfile> {
        self.country
            .as_deref()
            .and_then(|country| self.countries.get(country))
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn questions(&self) -> &[QuestionDefinition] {
        self.schema
            .as_ref()
            .map(|schema| schema.model.questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn answers(&self) -> Option<&AnswerMap> {
        self.schema.as_ref().map(|schema| &schema.answers)
    }

    pub fn variable_order(&self) -> &[String] {
        self.schema
            .as_ref()
            .map(|schema| schema.model.variable_order.as_slice())
            .unwrap_or(&[])
    }

    pub fn issues(&self) -> &[SchemaRowParseFailure] {
        self.schema
            .as_ref()
            .map(|schema| schema.issues.as_slice())
            .unwrap_or(&[])
    }

    pub fn wizard_state(&self) -> Option<WizardState> {
        self.schema.as_ref().map(|schema| schema.wizard.state())
    }

    pub fn metrics(&self) -> &ModelMetrics {
        &self.metrics
    }

    pub fn prediction(&self) -> Option<Prediction> {
        match &self.receipt {
            Some(SubmissionReceipt::Scored(prediction)) => Some(*prediction),
            _ => None,
        }
    }

    fn disclaimer_accepted(&self) -> bool {
        self.schema
            .as_ref()
            .map(|schema| schema.wizard.state().disclaimer_accepted)
            .unwrap_or(false)
    }

    fn loaded(&self) -> Result<&LoadedSchema, QuestionnaireError> {
        self.schema.as_ref().ok_or(QuestionnaireError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedSchema, QuestionnaireError> {
        self.schema.as_mut().ok_or(QuestionnaireError::NotLoaded)
    }

    fn ensure_idle(&self) -> Result<(), QuestionnaireError> {
        match &self.schema {
            Some(schema) if schema.wizard.state().submission_in_flight => {
                Err(WizardError::SubmissionInFlight.into())
            }
            _ => Ok(()),
        }
    }

    fn fetch_schema(
        &self,
        country: &str,
        profile: &CountryProfile,
    ) -> Result<(SchemaOrigin, ParsedSchema), QuestionnaireError> {
        let url = profile.csv.clone();
        let text = self
            .documents
            .fetch_text(&url)
            .map_err(|source| QuestionnaireError::SchemaFetchFailure {
                url: url.clone(),
                source,
            })?;
        let parsed = SchemaParser::from_str(&text)?;

        info!(
            country,
            rows = parsed.rows.len(),
            issues = parsed.issues.len(),
            "questionnaire schema fetched"
        );
        let origin = SchemaOrigin::Remote {
            country: country.to_string(),
            url,
        };
        Ok((origin, parsed))
    }

    fn fetch_metrics(&self, profile: &CountryProfile) -> ModelMetrics {
        let Some(url) = profile.metrics.as_deref() else {
            return ModelMetrics::default();
        };

        let parsed = self
            .documents
            .fetch_text(url)
            .map_err(|err| err.to_string())
            .and_then(|text| ModelMetrics::parse(&text).map_err(|err| err.to_string()));
        match parsed {
            Ok(metrics) => metrics,
            Err(error) => {
                warn!(%url, %error, "model metrics unavailable");
                ModelMetrics::default()
            }
        }
    }

    fn install_country(
        &mut self,
        country: String,
        origin: SchemaOrigin,
        parsed: ParsedSchema,
        metrics: ModelMetrics,
    ) {
        let accepted = self.disclaimer_accepted();
        self.schema = Some(LoadedSchema::new(origin, parsed, self.mode).with_disclaimer(accepted));
        self.country = Some(country);
        self.metrics = metrics;
        self.receipt = None;
    }

    /// Fetches the country directory and loads the default country's schema.
    pub fn load(&mut self) -> Result<(), QuestionnaireError> {
        self.ensure_idle()?;
        self.load_directory(None)
    }

    /// Fetches the directory, then installs `requested` or the default country.
    fn load_directory(&mut self, requested: Option<&str>) -> Result<(), QuestionnaireError> {
        let url = self.settings.country_config_url.clone();
        let text = self
            .documents
            .fetch_text(&url)
            .map_err(|source| QuestionnaireError::ConfigFetchFailure {
                url: url.clone(),
                source,
            })?;
        let countries = CountryDirectory::parse(&text)?;

        let country = if let Some(requested) = requested {
            requested.to_string()
        } else if countries.get(&self.settings.default_country).is_some() {
            self.settings.default_country.clone()
        } else {
            let fallback = countries
                .names()
                .into_iter()
                .next()
                .ok_or(CountryConfigError::NoCountries)?;
            warn!(
                default = %self.settings.default_country,
                %fallback,
                "default country missing from configuration"
            );
            fallback
        };
        let profile = countries
            .get(&country)
            .cloned()
            .ok_or_else(|| QuestionnaireError::UnknownCountry(country.clone()))?;

        let (origin, parsed) = self.fetch_schema(&country, &profile)?;
        let metrics = self.fetch_metrics(&profile);

        self.countries = countries;
        self.install_country(country, origin, parsed, metrics);
        Ok(())
    }

    /// Replaces the schema, answers and progress with another country's.
    ///
    /// With no directory yet (the first load failed) the directory is fetched again.
    pub fn select_country(&mut self, country: &str) -> Result<(), QuestionnaireError> {
        self.ensure_idle()?;
        if self.countries.is_empty() {
            return self.load_directory(Some(country));
        }

        let profile = self
            .countries
            .get(country)
            .cloned()
            .ok_or_else(|| QuestionnaireError::UnknownCountry(country.to_string()))?;
        let (origin, parsed) = self.fetch_schema(country, &profile)?;
        let metrics = self.fetch_metrics(&profile);

        info!(country, "country selected");
        self.install_country(country.to_string(), origin, parsed, metrics);
        Ok(())
    }

    /// Schema loaded from text supplied by the caller instead of a remote export.
    pub fn install_schema(&mut self, text: &str) -> Result<SchemaStats, QuestionnaireError> {
        self.ensure_idle()?;

        let parsed = SchemaParser::from_str(text).map_err(QuestionnaireError::UploadUnreadable)?;
        let accepted = self.disclaimer_accepted();
        let schema =
            LoadedSchema::new(SchemaOrigin::Uploaded, parsed, self.mode).with_disclaimer(accepted);
        let stats = schema.model.stats;

        self.schema = Some(schema);
        self.receipt = None;
        Ok(stats)
    }

    /// Switches between respondent and administrator questions, restarting the wizard.
    pub fn set_mode(&mut self, mode: DisplayMode) -> Result<(), QuestionnaireError> {
        self.ensure_idle()?;
        if mode == self.mode {
            return Ok(());
        }

        self.mode = mode;
        self.receipt = None;
        if let Some(schema) = self.schema.take() {
            self.schema = Some(LoadedSchema::new(schema.origin.clone(), schema.parsed(), mode));
        }
        info!(mode = mode.label(), "display mode changed");
        Ok(())
    }

    /// Turning debug on re-fetches the schema without losing progress.
    pub fn set_debug(&mut self, enabled: bool) -> Result<(), QuestionnaireError> {
        self.ensure_idle()?;
        if !enabled || self.debug {
            self.debug = enabled;
            return Ok(());
        }

        let remote = match self.schema.as_ref().map(|schema| &schema.origin) {
            Some(SchemaOrigin::Remote { country, .. }) => self
                .countries
                .get(country)
                .cloned()
                .map(|profile| (country.clone(), profile)),
            _ => None,
        };
        if let Some((country, profile)) = remote {
            let (origin, parsed) = self.fetch_schema(&country, &profile)?;
            let mode = self.mode;
            if let Some(schema) = self.schema.as_mut() {
                schema.refresh(origin, parsed, mode);
            }
            info!(%country, "debug mode enabled, questions reloaded");
        }

        self.debug = true;
        Ok(())
    }

    pub fn accept_disclaimer(&mut self) -> Result<(), QuestionnaireError> {
        self.loaded_mut()?.wizard.accept_disclaimer();
        Ok(())
    }

    pub fn set_answer(
        &mut self,
        variable: &str,
        value: AnswerValue,
    ) -> Result<(), QuestionnaireError> {
        let schema = self.loaded_mut()?;
        schema.wizard.ensure_answering()?;

        let question = schema
            .model
            .question(variable)
            .ok_or_else(|| QuestionnaireError::UnknownVariable(variable.to_string()))?;
        if !question.accepts(&value) {
            return Err(QuestionnaireError::InvalidAnswer {
                variable: variable.to_string(),
                value: value.to_string(),
            });
        }

        let value = match (&question.options, value.as_number()) {
            (Some(AnswerOptions::Range(_)), Some(number)) => AnswerValue::Number(number),
            _ => value,
        };
        schema.answers.insert(variable.to_string(), Some(value));
        Ok(())
    }

    pub fn navigate(&mut self, action: NavigationAction) -> Result<WizardPhase, QuestionnaireError> {
        let debug = self.debug;
        let phase = self.loaded_mut()?.wizard.navigate(action, debug)?;
        Ok(phase)
    }

    /// Freezes the payload and marks the submission in flight.
    ///
    /// The returned ticket is dispatched without the session; the outcome
    /// goes back through [`complete_submission`](Self::complete_submission).
    pub fn prepare_submission(&mut self) -> Result<SubmissionTicket, QuestionnaireError> {
        let mode = self.mode;
        let model = match self.profile() {
            Some(profile) => profile.model.clone(),
            None => return Err(QuestionnaireError::NoCountrySelected),
        };
        let endpoint = if mode.is_admin() {
            self.settings.admin_inference_url.clone()
        } else {
            self.settings.inference_url.clone()
        };

        let schema = self.loaded_mut()?;
        let kind = schema.wizard.begin_submission()?;
        let features = match mode {
            DisplayMode::Admin => Ok(build_admin_feature_vector(
                &schema.model.variable_order,
                &schema.answers,
            )),
            DisplayMode::Respondent => {
                build_feature_vector(&schema.model.variable_order, &schema.answers)
            }
        };
        let features = match features {
            Ok(features) => features,
            Err(err) => {
                schema.wizard.abort_submission();
                return Err(err);
            }
        };

        info!(
            %model,
            features = features.len(),
            kind = ?kind,
            "submission prepared"
        );
        Ok(SubmissionTicket {
            kind,
            mode,
            endpoint,
            model,
            request: InferenceRequest::single(features),
        })
    }

    /// Applies a dispatched ticket's outcome. Failures leave the previous prediction.
    pub fn complete_submission(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: Result<SubmissionReceipt, QuestionnaireError>,
    ) -> Result<SubmissionOutcome, QuestionnaireError> {
        let schema = self.loaded_mut()?;
        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                schema.wizard.abort_submission();
                warn!(model = %ticket.model, error = %err, "submission failed");
                return Err(err);
            }
        };

        let phase = schema.wizard.complete_submission()?;
        self.receipt = Some(receipt.clone());
        Ok(SubmissionOutcome {
            kind: ticket.kind,
            phase,
            receipt,
        })
    }

    pub fn abort_submission(&mut self) {
        if let Some(schema) = self.schema.as_mut() {
            schema.wizard.abort_submission();
        }
    }

    /// Prepare, dispatch and complete in one call.
    pub fn submit(&mut self) -> Result<SubmissionOutcome, QuestionnaireError> {
        let ticket = self.prepare_submission()?;
        let outcome = ticket.dispatch(self.inference.as_ref());
        self.complete_submission(&ticket, outcome)
    }

    /// Reloads the schema and resets answers, progress, prediction and the disclaimer.
    pub fn start_over(&mut self) -> Result<(), QuestionnaireError> {
        let schema = self.loaded()?;
        schema.wizard.ensure_can_start_over()?;

        let (origin, parsed) = match &schema.origin {
            SchemaOrigin::Remote { country, .. } => {
                let profile = self
                    .countries
                    .get(country)
                    .cloned()
                    .ok_or_else(|| QuestionnaireError::UnknownCountry(country.clone()))?;
                self.fetch_schema(country, &profile)?
            }
            SchemaOrigin::Uploaded => (SchemaOrigin::Uploaded, schema.parsed()),
        };

        self.schema = Some(LoadedSchema::new(origin, parsed, self.mode));
        self.receipt = None;
        info!("questionnaire restarted");
        Ok(())
    }

    pub fn review(&self) -> Result<Vec<ReviewEntry>, QuestionnaireError> {
        let schema = self.loaded()?;
        Ok(schema
            .model
            .questions
            .iter()
            .enumerate()
            .map(|(step, question)| ReviewEntry {
                step,
                variable: question.variable.clone(),
                prompt: question.prompt.clone(),
                answer: question.display_answer(
                    schema
                        .answers
                        .get(&question.variable)
                        .and_then(Option::as_ref),
                ),
            })
            .collect())
    }

    /// Verdict and flagged questions for the latest prediction.
    pub fn result(&self) -> Option<ResultView> {
        let prediction = self.prediction()?;
        let cutoff = self.profile()?.cutoff;
        let schema = self.schema.as_ref()?;
        Some(ResultView::evaluate(
            prediction.score,
            cutoff,
            &schema.model.questions,
            &schema.answers,
        ))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let title = match self.mode {
            DisplayMode::Respondent => "EMRI (Early Math Risk Identifier)",
            DisplayMode::Admin => "EMRI Teacher / Administrator Mode",
        };
        let state = self.wizard_state();
        let phase = state.map(|state| state.phase);
        let count = self.questions().len();

        let question = match (phase, self.schema.as_ref()) {
            (Some(WizardPhase::Answering { step }), Some(schema)) => {
                schema.model.questions.get(step).map(|question| CurrentQuestion {
                    step,
                    question: question.clone(),
                    answer: schema
                        .answers
                        .get(&question.variable)
                        .cloned()
                        .flatten(),
                })
            }
            _ => None,
        };
        let progress = self.schema.as_ref().map(|schema| Progress {
            current: (schema.wizard.step_index() + 1).min(count + 1),
            total: count + 1,
        });
        let review = match phase {
            Some(WizardPhase::Reviewing) => self.review().unwrap_or_default(),
            _ => Vec::new(),
        };
        let result = match phase {
            Some(WizardPhase::ShowingResult) => self.result(),
            _ => None,
        };
        let can_resubmit = matches!(
            state,
            Some(WizardState {
                phase: WizardPhase::Answering { .. },
                has_submitted_once: true,
                submission_in_flight: false,
                ..
            })
        );
        let disclaimer = match state {
            Some(state) if !state.disclaimer_accepted => Some(DISCLAIMER),
            _ => None,
        };
        let schema = self.schema.as_ref().map(|schema| SchemaSummary {
            origin: schema.origin.clone(),
            stats: schema.model.stats,
            issues: schema.issues.clone(),
        });
        let debug_info = self.debug.then(|| DebugView {
            variable_order: self.variable_order().to_vec(),
            answers: self.answers().cloned().unwrap_or_default(),
            model: self.profile().map(|profile| profile.model.clone()),
            notebook: self.profile().and_then(|profile| profile.notebook.clone()),
            score: self.prediction().map(|prediction| prediction.score),
            cutoff: self.profile().map(|profile| profile.cutoff),
        });

        SessionSnapshot {
            title,
            countries: self.countries.names(),
            country: self.country.clone(),
            mode: self.mode,
            debug: self.debug,
            disclaimer,
            wizard: state,
            progress,
            question,
            can_resubmit,
            review,
            result,
            metrics: self.metrics.clone(),
            schema,
            debug_info,
        }
    }
}
