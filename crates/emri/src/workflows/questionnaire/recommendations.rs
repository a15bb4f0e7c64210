use super::domain::{AnswerMap, QuestionDefinition};
use super::threshold::check_threshold;
use serde::Serialize;

/// A question whose recommendation rule fired for the current answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedQuestion {
    pub variable: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub answer: Option<String>,
    pub threshold: String,
    /// Markup from the schema, passed through untouched.
    pub recommendation: Option<String>,
}

/// Questions flagged by their thresholds, in question order.
///
/// Pure: the answer map is only read, so calling this twice yields the same list.
pub fn flagged_questions(
    questions: &[QuestionDefinition],
    answers: &AnswerMap,
) -> Vec<FlaggedQuestion> {
    questions
        .iter()
        .filter_map(|question| {
            let threshold = question.recommendation_threshold.as_deref()?;
            let answer = answers.get(&question.variable).and_then(Option::as_ref);
            if !check_threshold(Some(threshold), answer) {
                return None;
            }
            Some(FlaggedQuestion {
                variable: question.variable.clone(),
                prompt: question.prompt.clone(),
                context: question.context.clone(),
                answer: question.display_answer(answer),
                threshold: threshold.trim().to_string(),
                recommendation: question.recommendation_text.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Score below the country cutoff.
    NeedsAttention,
    NoConcerns,
}

impl Verdict {
    pub const fn headline(self) -> &'static str {
        match self {
            Verdict::NeedsAttention => {
                "The answers provided may indicate a lack of proficiency in math. Below are the observations."
            }
            Verdict::NoConcerns => {
                "There are no recommendations based on your answers as the prediction indicates a proficiency in math."
            }
        }
    }
}

/// What the respondent sees after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub verdict: Verdict,
    pub headline: &'static str,
    pub score: f64,
    pub cutoff: f64,
    /// Computed for both verdicts; the cutoff only picks the view.
    pub flagged: Vec<FlaggedQuestion>,
}

impl ResultView {
    pub fn evaluate(
        score: f64,
        cutoff: f64,
        questions: &[QuestionDefinition],
        answers: &AnswerMap,
    ) -> Self {
        let verdict = if score < cutoff {
            Verdict::NeedsAttention
        } else {
            Verdict::NoConcerns
        };

        Self {
            verdict,
            headline: verdict.headline(),
            score,
            cutoff,
            flagged: flagged_questions(questions, answers),
        }
    }

    /// Score as the whole percentage shown to respondents.
    pub fn score_percent(&self) -> i64 {
        (self.score * 100.0).round() as i64
    }
}
