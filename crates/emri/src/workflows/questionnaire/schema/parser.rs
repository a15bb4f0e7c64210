use super::answers::decode_answer_options;
use super::{ParsedSchema, RawRow, SchemaError, SchemaRowParseFailure};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use tracing::warn;

pub(crate) const VARIABLE_NAME_COLUMN: &str = "Variable_name";
const FLAG_SET: &str = "Yes";

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<ParsedSchema, SchemaError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if !headers
        .iter()
        .any(|header| header.trim_start_matches('\u{feff}') == VARIABLE_NAME_COLUMN)
    {
        return Err(SchemaError::MissingColumn(VARIABLE_NAME_COLUMN));
    }

    let mut parsed = ParsedSchema::default();

    for (index, record) in csv_reader.records().enumerate() {
        // Header is line 1; data rows are reported with spreadsheet numbering.
        let fallback_line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                parsed.reject(SchemaRowParseFailure {
                    line: err
                        .position()
                        .map(|position| position.line() as usize)
                        .unwrap_or(fallback_line),
                    variable: None,
                    reason: format!("unreadable record: {err}"),
                });
                continue;
            }
        };

        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(fallback_line);

        if record.iter().all(str::is_empty) {
            continue;
        }

        let row: SchemaRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(err) => {
                parsed.reject(SchemaRowParseFailure {
                    line,
                    variable: None,
                    reason: format!("unreadable record: {err}"),
                });
                continue;
            }
        };

        let Some(variable_name) = row.variable_name.clone() else {
            parsed.reject(SchemaRowParseFailure {
                line,
                variable: None,
                reason: "missing Variable_name".to_string(),
            });
            continue;
        };

        let answers_spec = match row.variable_answers.as_deref() {
            Some(raw) => match decode_answer_options(raw) {
                Ok(options) => Some(options),
                Err(err) => {
                    warn!(line, variable = %variable_name, error = %err, "ignoring malformed Variable_answers");
                    parsed.issues.push(SchemaRowParseFailure {
                        line,
                        variable: Some(variable_name.clone()),
                        reason: err.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        parsed.rows.push(RawRow {
            line,
            label: row.variable_label.unwrap_or_else(|| variable_name.clone()),
            variable_name,
            context: row.variable_context,
            answers_spec,
            hide: is_flag_set(row.hide.as_deref()),
            hidden_value: row.hidden_value,
            admin_only: is_flag_set(row.admin_only.as_deref()),
            recommendation_threshold: row.recommendation_threshold,
            recommendation_text: row.recommended_intervention,
        });
    }

    Ok(parsed)
}

fn is_flag_set(value: Option<&str>) -> bool {
    value == Some(FLAG_SET)
}

#[derive(Debug, Deserialize)]
struct SchemaRow {
    #[serde(
        rename = "Variable_name",
        alias = "\u{feff}Variable_name",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    variable_name: Option<String>,
    #[serde(
        rename = "Variable_context",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    variable_context: Option<String>,
    #[serde(
        rename = "Variable_label",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    variable_label: Option<String>,
    #[serde(
        rename = "Variable_answers",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    variable_answers: Option<String>,
    #[serde(rename = "Hide", default, deserialize_with = "empty_string_as_none")]
    hide: Option<String>,
    #[serde(
        rename = "Hidden_Value",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    hidden_value: Option<String>,
    #[serde(
        rename = "Admin_Only",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    admin_only: Option<String>,
    #[serde(
        rename = "Recommendation_Threshold",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    recommendation_threshold: Option<String>,
    #[serde(
        rename = "Recommended_Intervention",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    recommended_intervention: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
