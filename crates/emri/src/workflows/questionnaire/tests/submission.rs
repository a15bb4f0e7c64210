use super::common::*;
use crate::workflows::questionnaire::domain::{AnswerValue, DisplayMode};
use crate::workflows::questionnaire::error::QuestionnaireError;
use crate::workflows::questionnaire::recommendations::Verdict;
use crate::workflows::questionnaire::submission::SubmissionReceipt;
use crate::workflows::questionnaire::wizard::{
    NavigationAction, SubmissionKind, WizardError, WizardPhase,
};
use serde_json::{json, Value};

fn walk_to_review(harness: &mut Harness) {
    harness
        .session
        .navigate(NavigationAction::Next)
        .expect("next");
    harness
        .session
        .navigate(NavigationAction::Review)
        .expect("review");
}

#[test]
fn submit_scores_in_schema_order_and_shows_recommendations() {
    let mut harness = ready_harness();
    harness.inference.respond_with(prediction_body(0.3));
    walk_to_review(&mut harness);

    let outcome = harness.session.submit().expect("submission succeeds");
    assert_eq!(outcome.kind, SubmissionKind::Submit);
    assert_eq!(outcome.phase, WizardPhase::ShowingResult);
    assert!(matches!(outcome.receipt, SubmissionReceipt::Scored(_)));

    let calls = harness.inference.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].endpoint, INFERENCE_URL);
    assert_eq!(calls[0].model, "us-model.tar.gz");
    assert_eq!(
        calls[0].request.features(),
        &[json!(1.0), json!(4.0), json!(2.0), json!(0.0)]
    );

    let result = harness.session.result().expect("result view");
    assert_eq!(result.verdict, Verdict::NeedsAttention);
    assert_eq!(result.cutoff, 0.5);
    assert_eq!(result.flagged.len(), 1);
    assert_eq!(result.flagged[0].variable, "ST001");
    assert_eq!(result.flagged[0].answer.as_deref(), Some("None"));
    assert_eq!(
        result.flagged[0].recommendation.as_deref(),
        Some("<b>Read together</b>")
    );
    assert_eq!(harness.session.result(), Some(result.clone()));
    assert_eq!(harness.session.snapshot().result, Some(result));
}

#[test]
fn high_scores_report_no_concerns() {
    let mut harness = ready_harness();
    harness.inference.respond_with(prediction_body(0.9));
    walk_to_review(&mut harness);

    harness.session.submit().expect("submission succeeds");
    let result = harness.session.result().expect("result view");
    assert_eq!(result.verdict, Verdict::NoConcerns);
    assert_eq!(result.flagged.len(), 1, "thresholds are independent of the cutoff");
}

#[test]
fn undecodable_response_leaves_prediction_unset() {
    let mut harness = ready_harness();
    harness.inference.respond_with(r#"{"result": 0.4}"#);
    walk_to_review(&mut harness);

    assert!(matches!(
        harness.session.submit(),
        Err(QuestionnaireError::SubmissionDecodeFailure(_))
    ));
    assert!(harness.session.prediction().is_none());
    let state = harness.session.wizard_state().expect("wizard");
    assert_eq!(state.phase, WizardPhase::Reviewing);
    assert!(!state.submission_in_flight);
    assert!(!state.has_submitted_once);

    harness.inference.respond_with(prediction_body(0.6));
    harness.session.submit().expect("retry succeeds");
    assert_eq!(harness.session.prediction().map(|p| p.score), Some(0.6));
}

#[test]
fn network_failure_is_retryable() {
    let mut harness = ready_harness();
    walk_to_review(&mut harness);

    match harness.session.submit() {
        Err(err @ QuestionnaireError::SubmissionNetworkFailure(_)) => assert!(err.is_upstream()),
        other => panic!("expected network failure, got {other:?}"),
    }
    assert_eq!(
        harness.session.wizard_state().map(|state| state.phase),
        Some(WizardPhase::Reviewing)
    );
}

#[test]
fn in_flight_submission_freezes_the_session() {
    let mut harness = ready_harness();
    walk_to_review(&mut harness);

    let ticket = harness.session.prepare_submission().expect("ticket");
    assert!(harness.session.snapshot().wizard.expect("wizard").submission_in_flight);

    assert!(matches!(
        harness.session.prepare_submission(),
        Err(QuestionnaireError::Wizard(WizardError::SubmissionInFlight))
    ));
    assert!(matches!(
        harness.session.navigate(NavigationAction::Back),
        Err(QuestionnaireError::Wizard(WizardError::SubmissionInFlight))
    ));
    assert!(matches!(
        harness.session.select_country("Kenya"),
        Err(QuestionnaireError::Wizard(WizardError::SubmissionInFlight))
    ));
    assert!(harness.session.set_debug(true).is_err());

    harness.inference.respond_with(prediction_body(0.2));
    let outcome = ticket.dispatch(harness.session.inference_gateway().as_ref());
    let outcome = harness
        .session
        .complete_submission(&ticket, outcome)
        .expect("completes");
    assert_eq!(outcome.phase, WizardPhase::ShowingResult);
    assert_eq!(harness.inference.calls().len(), 1);
}

#[test]
fn resubmitting_from_a_question_keeps_the_step() {
    let mut harness = ready_harness();
    harness.inference.respond_with(prediction_body(0.3));
    walk_to_review(&mut harness);
    harness.session.submit().expect("first submission");

    harness
        .session
        .navigate(NavigationAction::Back)
        .expect("back to review");
    harness
        .session
        .navigate(NavigationAction::Back)
        .expect("back to last question");
    harness
        .session
        .set_answer("ST003", AnswerValue::Number(9.0))
        .expect("answer");
    assert!(harness.session.snapshot().can_resubmit);

    harness.inference.respond_with(prediction_body(0.45));
    let outcome = harness.session.submit().expect("resubmission");
    assert_eq!(outcome.kind, SubmissionKind::Resubmit);
    assert_eq!(outcome.phase, WizardPhase::Answering { step: 1 });
    assert_eq!(harness.session.prediction().map(|p| p.score), Some(0.45));

    let flagged = harness.session.result().expect("result").flagged;
    let names: Vec<&str> = flagged.iter().map(|f| f.variable.as_str()).collect();
    assert_eq!(names, vec!["ST001", "ST003"]);
}

#[test]
fn start_over_reproduces_the_first_load() {
    let mut harness = ready_harness();
    let first_defaults = harness.session.answers().cloned().expect("answers");

    harness
        .session
        .set_answer("ST001", AnswerValue::Number(3.0))
        .expect("answer");
    assert!(matches!(
        harness.session.start_over(),
        Err(QuestionnaireError::Wizard(WizardError::InvalidTransition { .. }))
    ));

    harness.inference.respond_with(prediction_body(0.3));
    walk_to_review(&mut harness);
    harness.session.submit().expect("submission");
    harness.session.start_over().expect("start over");

    assert_eq!(harness.session.answers(), Some(&first_defaults));
    assert!(harness.session.prediction().is_none());
    let state = harness.session.wizard_state().expect("wizard");
    assert_eq!(state.phase, WizardPhase::Answering { step: 0 });
    assert!(!state.disclaimer_accepted);
    assert!(!state.has_submitted_once);
    assert_eq!(harness.documents.fetch_count(US_SCHEMA_URL), 2);
}

#[test]
fn failed_start_over_keeps_the_result() {
    let mut harness = ready_harness();
    harness.inference.respond_with(prediction_body(0.3));
    walk_to_review(&mut harness);
    harness.session.submit().expect("submission");

    harness.documents.remove(US_SCHEMA_URL);
    assert!(matches!(
        harness.session.start_over(),
        Err(QuestionnaireError::SchemaFetchFailure { .. })
    ));
    assert_eq!(
        harness.session.wizard_state().map(|state| state.phase),
        Some(WizardPhase::ShowingResult)
    );
    assert!(harness.session.prediction().is_some());
}

#[test]
fn admin_submission_is_recorded_without_a_score() {
    let mut harness = ready_harness();
    harness
        .session
        .set_mode(DisplayMode::Admin)
        .expect("admin mode");
    harness.session.accept_disclaimer().expect("disclaimer");
    harness
        .session
        .set_answer("AD001", AnswerValue::from("large"))
        .expect("answer");
    harness
        .session
        .navigate(NavigationAction::Review)
        .expect("review");
    harness.inference.respond_with("{}");

    let outcome = harness.session.submit().expect("admin submission");
    assert_eq!(outcome.receipt, SubmissionReceipt::Recorded);
    assert!(harness.session.prediction().is_none());
    assert!(harness.session.result().is_none());

    let calls = harness.inference.calls();
    assert_eq!(calls[0].endpoint, ADMIN_URL);
    assert_eq!(
        calls[0].request.features(),
        &[Value::Null, Value::Null, Value::Null, json!("large")]
    );
}
