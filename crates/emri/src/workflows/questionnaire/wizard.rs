use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the respondent currently is in the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WizardPhase {
    Answering { step: usize },
    Reviewing,
    ShowingResult,
}

impl fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardPhase::Answering { step } => write!(f, "answering question {}", step + 1),
            WizardPhase::Reviewing => f.write_str("reviewing answers"),
            WizardPhase::ShowingResult => f.write_str("showing the result"),
        }
    }
}

/// Step navigation requested by the respondent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavigationAction {
    Back,
    Next,
    Review,
    /// Debug-only shortcut to any question.
    JumpTo { step: usize },
}

impl NavigationAction {
    const fn label(self) -> &'static str {
        match self {
            Self::Back => "go back",
            Self::Next => "go to the next question",
            Self::Review => "review answers",
            Self::JumpTo { .. } => "jump to a question",
        }
    }
}

/// Which button triggered a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    /// From the review table; success shows the result.
    Submit,
    /// From a question after a first result; success keeps the current step.
    Resubmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WizardState {
    #[serde(flatten)]
    pub phase: WizardPhase,
    pub has_submitted_once: bool,
    pub disclaimer_accepted: bool,
    pub submission_in_flight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("the disclaimer must be accepted first")]
    DisclaimerPending,
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: WizardPhase,
    },
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("no submission is in flight")]
    NoSubmissionInFlight,
}

/// Finite-state sequencer over the visible questions.
///
/// Steps `0..N` answer questions, step `N` is the review table. The
/// controller never performs I/O: submissions are bracketed by
/// [`begin_submission`](Self::begin_submission) and either
/// [`complete_submission`](Self::complete_submission) or
/// [`abort_submission`](Self::abort_submission).
#[derive(Debug, Clone)]
pub struct WizardController {
    question_count: usize,
    state: WizardState,
    pending: Option<SubmissionKind>,
}

impl WizardController {
    pub fn new(question_count: usize) -> Self {
        Self {
            question_count,
            state: WizardState {
                phase: Self::first_phase(question_count),
                has_submitted_once: false,
                disclaimer_accepted: false,
                submission_in_flight: false,
            },
            pending: None,
        }
    }

    fn first_phase(question_count: usize) -> WizardPhase {
        if question_count == 0 {
            WizardPhase::Reviewing
        } else {
            WizardPhase::Answering { step: 0 }
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn phase(&self) -> WizardPhase {
        self.state.phase
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Index of the current step, `N` while reviewing or showing a result.
    pub fn step_index(&self) -> usize {
        match self.state.phase {
            WizardPhase::Answering { step } => step,
            WizardPhase::Reviewing | WizardPhase::ShowingResult => self.question_count,
        }
    }

    pub fn accept_disclaimer(&mut self) {
        self.state.disclaimer_accepted = true;
    }

    pub fn ensure_answering(&self) -> Result<usize, WizardError> {
        self.ensure_ready()?;
        match self.state.phase {
            WizardPhase::Answering { step } => Ok(step),
            phase => Err(WizardError::InvalidTransition {
                action: "change an answer",
                phase,
            }),
        }
    }

    fn ensure_ready(&self) -> Result<(), WizardError> {
        if !self.state.disclaimer_accepted {
            return Err(WizardError::DisclaimerPending);
        }
        if self.state.submission_in_flight {
            return Err(WizardError::SubmissionInFlight);
        }
        Ok(())
    }

    pub fn navigate(
        &mut self,
        action: NavigationAction,
        debug_enabled: bool,
    ) -> Result<WizardPhase, WizardError> {
        self.ensure_ready()?;

        let count = self.question_count;
        let phase = self.state.phase;
        let invalid = || WizardError::InvalidTransition {
            action: action.label(),
            phase,
        };

        let next = match (action, phase) {
            (NavigationAction::Back, WizardPhase::Answering { step: 0 }) => phase,
            (NavigationAction::Back, WizardPhase::Answering { step }) => {
                WizardPhase::Answering { step: step - 1 }
            }
            (NavigationAction::Back, WizardPhase::Reviewing) if count > 0 => {
                WizardPhase::Answering { step: count - 1 }
            }
            (NavigationAction::Back, WizardPhase::ShowingResult) => WizardPhase::Reviewing,
            (NavigationAction::Next, WizardPhase::Answering { step }) if step + 1 < count => {
                WizardPhase::Answering { step: step + 1 }
            }
            (NavigationAction::Review, WizardPhase::Answering { step }) if step + 1 == count => {
                WizardPhase::Reviewing
            }
            (
                NavigationAction::JumpTo { step: target },
                WizardPhase::Answering { .. } | WizardPhase::Reviewing,
            ) if debug_enabled && target < count => WizardPhase::Answering { step: target },
            _ => return Err(invalid()),
        };

        self.state.phase = next;
        Ok(next)
    }

    /// Marks a submission as in flight and reports which kind it is.
    pub fn begin_submission(&mut self) -> Result<SubmissionKind, WizardError> {
        self.ensure_ready()?;

        let kind = match self.state.phase {
            WizardPhase::Reviewing => SubmissionKind::Submit,
            WizardPhase::Answering { .. } if self.state.has_submitted_once => {
                SubmissionKind::Resubmit
            }
            phase => {
                return Err(WizardError::InvalidTransition {
                    action: "submit",
                    phase,
                })
            }
        };

        self.state.submission_in_flight = true;
        self.pending = Some(kind);
        Ok(kind)
    }

    pub fn complete_submission(&mut self) -> Result<WizardPhase, WizardError> {
        let kind = self
            .pending
            .take()
            .ok_or(WizardError::NoSubmissionInFlight)?;

        self.state.submission_in_flight = false;
        self.state.has_submitted_once = true;
        if kind == SubmissionKind::Submit {
            self.state.phase = WizardPhase::ShowingResult;
        }
        Ok(self.state.phase)
    }

    /// Clears the in-flight flag after a failed submission; nothing else moves.
    pub fn abort_submission(&mut self) {
        self.pending = None;
        self.state.submission_in_flight = false;
    }

    pub fn ensure_can_start_over(&self) -> Result<(), WizardError> {
        if self.state.submission_in_flight {
            return Err(WizardError::SubmissionInFlight);
        }
        match self.state.phase {
            WizardPhase::ShowingResult => Ok(()),
            phase => Err(WizardError::InvalidTransition {
                action: "start over",
                phase,
            }),
        }
    }

    /// Adopts a re-fetched question list while keeping the respondent's place.
    pub fn rebind(&mut self, question_count: usize) {
        self.question_count = question_count;
        if let WizardPhase::Answering { step } = self.state.phase {
            self.state.phase = if question_count == 0 {
                WizardPhase::Reviewing
            } else {
                WizardPhase::Answering {
                    step: step.min(question_count - 1),
                }
            };
        }
    }
}
