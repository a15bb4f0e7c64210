use super::super::domain::{AnswerOptions, ChoiceOption, RangeOptions};
use serde::Deserialize;
use serde_json::Value;

/// Why a `Variable_answers` cell could not be turned into an option set.
#[derive(Debug, thiserror::Error)]
pub enum AnswerSpecError {
    #[error("not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("expected a list of {{value, text}} entries or a {{range}} object")]
    UnsupportedShape,
    #[error("invalid choice entry: {0}")]
    InvalidChoice(#[source] serde_json::Error),
    #[error("choice list is empty")]
    EmptyChoices,
    #[error("choice value '{0}' appears more than once")]
    DuplicateChoice(String),
    #[error("invalid range: {0}")]
    InvalidRangeShape(#[source] serde_json::Error),
    #[error("range requires min <= max and step > 0 (min {min}, max {max}, step {step})")]
    InvalidRangeBounds { min: f64, max: f64, step: f64 },
}

#[derive(Debug, Deserialize)]
struct RangeCell {
    min: f64,
    max: f64,
    #[serde(default = "default_step")]
    step: f64,
}

fn default_step() -> f64 {
    1.0
}

/// Decodes the JSON carried in a spreadsheet cell.
///
/// Attempts run in a fixed order: the cell as-is, then with doubled quotes
/// collapsed, and a JSON string result is unwrapped once more.
pub(crate) fn decode_answer_options(raw: &str) -> Result<AnswerOptions, AnswerSpecError> {
    let value = parse_cell_json(raw)?;
    let value = match value {
        Value::String(inner) => parse_cell_json(&inner)?,
        other => other,
    };

    match value {
        Value::Array(_) => decode_choices(value),
        Value::Object(mut object) => match object.remove("range") {
            Some(range) => decode_range(range),
            None => Err(AnswerSpecError::UnsupportedShape),
        },
        _ => Err(AnswerSpecError::UnsupportedShape),
    }
}

fn parse_cell_json(raw: &str) -> Result<Value, AnswerSpecError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Ok(value),
        Err(err) if raw.contains("\"\"") => {
            serde_json::from_str::<Value>(&raw.replace("\"\"", "\""))
                .map_err(|_| AnswerSpecError::NotJson(err))
        }
        Err(err) => Err(AnswerSpecError::NotJson(err)),
    }
}

fn decode_choices(value: Value) -> Result<AnswerOptions, AnswerSpecError> {
    let choices: Vec<ChoiceOption> =
        serde_json::from_value(value).map_err(AnswerSpecError::InvalidChoice)?;

    if choices.is_empty() {
        return Err(AnswerSpecError::EmptyChoices);
    }

    for (index, choice) in choices.iter().enumerate() {
        if choices[..index]
            .iter()
            .any(|earlier| earlier.value == choice.value)
        {
            return Err(AnswerSpecError::DuplicateChoice(choice.value.to_string()));
        }
    }

    Ok(AnswerOptions::Enumerated { choices })
}

fn decode_range(value: Value) -> Result<AnswerOptions, AnswerSpecError> {
    let RangeCell { min, max, step } =
        serde_json::from_value(value).map_err(AnswerSpecError::InvalidRangeShape)?;

    if !(min.is_finite() && max.is_finite() && step.is_finite()) || min > max || step <= 0.0 {
        return Err(AnswerSpecError::InvalidRangeBounds { min, max, step });
    }

    Ok(AnswerOptions::Range(RangeOptions { min, max, step }))
}
