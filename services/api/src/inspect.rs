use clap::Args;
use emri::error::AppError;
use emri::workflows::questionnaire::{
    AnswerOptions, DisplayMode, ParsedSchema, QuestionModel, SchemaParser,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct InspectArgs {
    /// Schema export (CSV) to parse
    pub(crate) path: PathBuf,
    /// Build the administrator question set instead of the respondent one
    #[arg(long)]
    pub(crate) admin: bool,
    /// Print the full question model as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_inspect(args: InspectArgs) -> Result<(), AppError> {
    let InspectArgs { path, admin, json } = args;
    let mode = if admin {
        DisplayMode::Admin
    } else {
        DisplayMode::Respondent
    };

    let parsed = SchemaParser::from_path(&path)?;
    let model = QuestionModel::build(&parsed.rows, mode);

    if json {
        let document = json!({
            "mode": model.mode,
            "stats": model.stats,
            "issues": parsed.issues,
            "variable_order": model.variable_order,
            "defaults": model.defaults,
            "questions": model.questions,
        });
        let rendered = serde_json::to_string_pretty(&document).map_err(std::io::Error::other)?;
        println!("{rendered}");
        return Ok(());
    }

    render_summary(&path, &parsed, &model);
    Ok(())
}

fn render_summary(path: &std::path::Path, parsed: &ParsedSchema, model: &QuestionModel) {
    let stats = model.stats;
    println!("Schema {} ({} mode)", path.display(), model.mode.label());
    println!(
        "- {} rows | {} hidden | {} admin only | {} visible questions",
        stats.total_rows, stats.hidden_rows, stats.admin_only_rows, stats.visible_questions
    );

    if !parsed.issues.is_empty() {
        println!("Row issues:");
        for issue in &parsed.issues {
            println!("  - {issue}");
        }
    }

    println!("Questions:");
    for (index, question) in model.questions.iter().enumerate() {
        let options = match &question.options {
            Some(AnswerOptions::Enumerated { choices }) => format!("{} choices", choices.len()),
            Some(AnswerOptions::Range(range)) => {
                format!("range {}..={} step {}", range.min, range.max, range.step)
            }
            None => "free form".to_string(),
        };
        let default = model
            .defaults
            .get(&question.variable)
            .and_then(Option::as_ref)
            .map(|value| value.to_string())
            .unwrap_or_else(|| "none".to_string());
        println!(
            "  {:>2}. {} - {} [{options}, default {default}]",
            index + 1,
            question.variable,
            question.prompt
        );
        if let Some(threshold) = &question.recommendation_threshold {
            println!("      flags when answer {threshold}");
        }
    }
}
