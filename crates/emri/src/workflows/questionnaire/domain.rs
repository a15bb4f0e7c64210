use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single answer as it travels through the wizard and into the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

impl AnswerValue {
    /// Numeric reading of the answer; text is coerced when it parses cleanly.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(value) if value.is_finite() => Some(*value),
            AnswerValue::Number(_) => None,
            AnswerValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AnswerValue::Number(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AnswerValue::Text(text) => serde_json::Value::String(text.clone()),
        }
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            AnswerValue::Number(value) => write!(f, "{value}"),
            AnswerValue::Text(text) => f.write_str(text),
        }
    }
}

/// One selectable entry of an enumerated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: AnswerValue,
    pub text: String,
}

/// Slider bounds for a numeric question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeOptions {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl RangeOptions {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Structured answer set decoded from the `Variable_answers` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerOptions {
    Enumerated { choices: Vec<ChoiceOption> },
    Range(RangeOptions),
}

impl AnswerOptions {
    /// Schema-declared default: first choice, or the bottom of the range.
    pub fn default_value(&self) -> Option<AnswerValue> {
        match self {
            AnswerOptions::Enumerated { choices } => {
                choices.first().map(|choice| choice.value.clone())
            }
            AnswerOptions::Range(range) => Some(AnswerValue::Number(range.min)),
        }
    }
}

/// Which slice of the schema becomes visible questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Respondent,
    Admin,
}

impl DisplayMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Respondent => "Respondent",
            Self::Admin => "Administrator",
        }
    }

    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// User-facing question derived from a schema row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<AnswerOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_text: Option<String>,
}

impl QuestionDefinition {
    /// Human readable answer; enumerated values resolve to their option text.
    pub fn display_answer(&self, value: Option<&AnswerValue>) -> Option<String> {
        let value = value?;
        if let Some(AnswerOptions::Enumerated { choices }) = &self.options {
            if let Some(choice) = choices.iter().find(|choice| &choice.value == value) {
                return Some(choice.text.clone());
            }
        }
        Some(value.to_string())
    }

    /// Whether `value` is a legal answer for this question's option set.
    pub fn accepts(&self, value: &AnswerValue) -> bool {
        match &self.options {
            Some(AnswerOptions::Enumerated { choices }) => {
                choices.iter().any(|choice| &choice.value == value)
            }
            Some(AnswerOptions::Range(range)) => value
                .as_number()
                .map(|number| range.contains(number))
                .unwrap_or(false),
            None => true,
        }
    }
}

/// Current answer per variable. `None` marks a variable with no default.
pub type AnswerMap = BTreeMap<String, Option<AnswerValue>>;
