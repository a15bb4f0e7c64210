use super::domain::{AnswerMap, AnswerValue, DisplayMode, QuestionDefinition};
use super::schema::RawRow;
use serde::Serialize;
use tracing::info;

/// Row counts reported whenever a schema is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchemaStats {
    pub total_rows: usize,
    pub hidden_rows: usize,
    pub admin_only_rows: usize,
    pub visible_questions: usize,
}

/// Everything the wizard and the payload builder need from one schema load.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionModel {
    pub mode: DisplayMode,
    pub questions: Vec<QuestionDefinition>,
    pub defaults: AnswerMap,
    pub variable_order: Vec<String>,
    pub stats: SchemaStats,
}

impl QuestionModel {
    pub fn build(rows: &[RawRow], mode: DisplayMode) -> Self {
        let mut questions = Vec::new();
        let mut defaults = AnswerMap::new();
        let mut variable_order = Vec::with_capacity(rows.len());
        let mut stats = SchemaStats {
            total_rows: rows.len(),
            ..SchemaStats::default()
        };

        for row in rows {
            if row.hide {
                stats.hidden_rows += 1;
            }
            if row.admin_only {
                stats.admin_only_rows += 1;
            }

            // Every row keeps its slot: the model was trained on this column order.
            variable_order.push(row.variable_name.clone());

            match row_role(row, mode) {
                RowRole::Dropped => {}
                RowRole::Hidden => {
                    let hidden = parse_int_prefix(row.hidden_value.as_deref());
                    let value = AnswerValue::Number(hidden as f64);
                    defaults
                        .entry(row.variable_name.clone())
                        .or_insert(Some(value));
                }
                RowRole::Visible => {
                    let question = question_from_row(row, mode);
                    let default = question
                        .options
                        .as_ref()
                        .and_then(|options| options.default_value());
                    defaults.entry(row.variable_name.clone()).or_insert(default);
                    questions.push(question);
                }
            }
        }

        stats.visible_questions = questions.len();
        info!(
            mode = mode.label(),
            total = stats.total_rows,
            hidden = stats.hidden_rows,
            admin_only = stats.admin_only_rows,
            visible = stats.visible_questions,
            "questions loaded from schema"
        );

        Self {
            mode,
            questions,
            defaults,
            variable_order,
            stats,
        }
    }

    pub fn question(&self, variable: &str) -> Option<&QuestionDefinition> {
        self.questions
            .iter()
            .find(|question| question.variable == variable)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

enum RowRole {
    Visible,
    Hidden,
    Dropped,
}

fn row_role(row: &RawRow, mode: DisplayMode) -> RowRole {
    match mode {
        DisplayMode::Admin if row.admin_only => RowRole::Visible,
        DisplayMode::Admin => RowRole::Dropped,
        DisplayMode::Respondent if row.hide => RowRole::Hidden,
        DisplayMode::Respondent => RowRole::Visible,
    }
}

fn question_from_row(row: &RawRow, mode: DisplayMode) -> QuestionDefinition {
    let (recommendation_threshold, recommendation_text) = match mode {
        DisplayMode::Respondent => (
            row.recommendation_threshold.clone(),
            row.recommendation_text.clone(),
        ),
        DisplayMode::Admin => (None, None),
    };

    QuestionDefinition {
        variable: row.variable_name.clone(),
        context: row.context.clone(),
        prompt: row.label.clone(),
        options: row.answers_spec.clone(),
        recommendation_threshold,
        recommendation_text,
    }
}

/// Leading integer of a spreadsheet cell, `0` when there is none.
///
/// `"3"`, `"3.9"` and `" 3 apples"` all read as `3`.
pub(crate) fn parse_int_prefix(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end]
        .parse::<i64>()
        .map(|value| sign * value)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::questionnaire::domain::{AnswerOptions, ChoiceOption, RangeOptions};

    fn row(name: &str) -> RawRow {
        RawRow {
            line: 0,
            variable_name: name.to_string(),
            context: None,
            label: format!("Question {name}"),
            answers_spec: None,
            hide: false,
            hidden_value: None,
            admin_only: false,
            recommendation_threshold: None,
            recommendation_text: None,
        }
    }

    fn choices(values: &[f64]) -> Option<AnswerOptions> {
        Some(AnswerOptions::Enumerated {
            choices: values
                .iter()
                .map(|value| ChoiceOption {
                    value: AnswerValue::Number(*value),
                    text: format!("option {value}"),
                })
                .collect(),
        })
    }

    fn range(min: f64, max: f64) -> Option<AnswerOptions> {
        Some(AnswerOptions::Range(RangeOptions {
            min,
            max,
            step: 1.0,
        }))
    }

    fn mixed_rows() -> Vec<RawRow> {
        vec![
            RawRow {
                answers_spec: choices(&[1.0, 2.0]),
                recommendation_threshold: Some("< 2".to_string()),
                recommendation_text: Some("Read together".to_string()),
                ..row("ST001")
            },
            RawRow {
                hide: true,
                hidden_value: Some("4".to_string()),
                answers_spec: choices(&[9.0]),
                ..row("ST002")
            },
            RawRow {
                admin_only: true,
                answers_spec: range(2.0, 10.0),
                ..row("AD001")
            },
            RawRow {
                hide: true,
                hidden_value: Some("n/a".to_string()),
                ..row("ST003")
            },
            row("ST004"),
        ]
    }

    #[test]
    fn variable_order_covers_every_row_in_any_mode() {
        let rows = mixed_rows();
        for mode in [DisplayMode::Respondent, DisplayMode::Admin] {
            let model = QuestionModel::build(&rows, mode);
            assert_eq!(
                model.variable_order,
                vec!["ST001", "ST002", "AD001", "ST003", "ST004"]
            );
        }
    }

    #[test]
    fn respondent_mode_hides_rows_and_uses_hidden_value() {
        let model = QuestionModel::build(&mixed_rows(), DisplayMode::Respondent);

        let visible: Vec<&str> = model
            .questions
            .iter()
            .map(|question| question.variable.as_str())
            .collect();
        assert_eq!(visible, vec!["ST001", "AD001", "ST004"]);

        assert_eq!(model.defaults["ST001"], Some(AnswerValue::Number(1.0)));
        assert_eq!(model.defaults["ST002"], Some(AnswerValue::Number(4.0)));
        assert_eq!(model.defaults["AD001"], Some(AnswerValue::Number(2.0)));
        assert_eq!(model.defaults["ST003"], Some(AnswerValue::Number(0.0)));
        assert_eq!(model.defaults["ST004"], None);
        assert!(model.defaults.contains_key("ST004"));

        let first = model.question("ST001").expect("visible question");
        assert_eq!(first.recommendation_threshold.as_deref(), Some("< 2"));
        assert_eq!(first.prompt, "Question ST001");
    }

    #[test]
    fn admin_mode_keeps_only_admin_rows() {
        let model = QuestionModel::build(&mixed_rows(), DisplayMode::Admin);

        assert_eq!(model.len(), 1);
        assert_eq!(model.questions[0].variable, "AD001");
        assert_eq!(model.questions[0].recommendation_threshold, None);
        assert_eq!(model.defaults.len(), 1);
        assert_eq!(model.defaults["AD001"], Some(AnswerValue::Number(2.0)));
    }

    #[test]
    fn hidden_admin_rows_never_become_visible() {
        let rows = vec![RawRow {
            hide: true,
            admin_only: true,
            hidden_value: Some("7".to_string()),
            ..row("AD002")
        }];

        let respondent = QuestionModel::build(&rows, DisplayMode::Respondent);
        assert!(respondent.is_empty());
        assert_eq!(respondent.defaults["AD002"], Some(AnswerValue::Number(7.0)));
    }

    #[test]
    fn first_default_wins_for_duplicate_variables() {
        let rows = vec![
            RawRow {
                answers_spec: choices(&[5.0]),
                ..row("ST001")
            },
            RawRow {
                answers_spec: choices(&[8.0]),
                ..row("ST001")
            },
        ];

        let model = QuestionModel::build(&rows, DisplayMode::Respondent);
        assert_eq!(model.defaults["ST001"], Some(AnswerValue::Number(5.0)));
        assert_eq!(model.variable_order.len(), 2);
    }

    #[test]
    fn stats_count_flags() {
        let model = QuestionModel::build(&mixed_rows(), DisplayMode::Respondent);
        assert_eq!(
            model.stats,
            SchemaStats {
                total_rows: 5,
                hidden_rows: 2,
                admin_only_rows: 1,
                visible_questions: 3,
            }
        );
    }

    #[test]
    fn parse_int_prefix_matches_spreadsheet_integers() {
        assert_eq!(parse_int_prefix(Some("3")), 3);
        assert_eq!(parse_int_prefix(Some(" 3.9")), 3);
        assert_eq!(parse_int_prefix(Some("-2")), -2);
        assert_eq!(parse_int_prefix(Some("12 apples")), 12);
        assert_eq!(parse_int_prefix(Some("abc")), 0);
        assert_eq!(parse_int_prefix(Some("")), 0);
        assert_eq!(parse_int_prefix(None), 0);
    }
}
