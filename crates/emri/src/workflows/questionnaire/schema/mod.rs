//! Questionnaire schema ingestion.
//!
//! The schema is a spreadsheet export with one row per variable. A row whose
//! option cell is malformed keeps its place in the schema with no structured
//! options; a row that cannot be read at all is skipped. Either way the issue
//! is logged and recorded so the rest of the schema still loads.

mod answers;
mod parser;

pub use answers::AnswerSpecError;

use super::domain::AnswerOptions;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// One schema record, exactly as the spreadsheet declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub variable_name: String,
    pub context: Option<String>,
    pub label: String,
    pub answers_spec: Option<AnswerOptions>,
    pub hide: bool,
    pub hidden_value: Option<String>,
    pub admin_only: bool,
    pub recommendation_threshold: Option<String>,
    pub recommendation_text: Option<String>,
}

/// Non-fatal problem with a single schema row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("schema row {line}{}: {reason}", variable.as_ref().map(|name| format!(" ({name})")).unwrap_or_default())]
pub struct SchemaRowParseFailure {
    pub line: usize,
    pub variable: Option<String>,
    pub reason: String,
}

/// Rows in schema order plus whatever was wrong along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSchema {
    pub rows: Vec<RawRow>,
    pub issues: Vec<SchemaRowParseFailure>,
}

impl ParsedSchema {
    fn reject(&mut self, issue: SchemaRowParseFailure) {
        warn!(line = issue.line, reason = %issue.reason, "skipping schema row");
        self.issues.push(issue);
    }
}

/// Fatal schema problem: nothing usable could be read.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("invalid schema CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SchemaParser;

impl SchemaParser {
    pub fn from_str(text: &str) -> Result<ParsedSchema, SchemaError> {
        Self::from_reader(text.as_bytes())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ParsedSchema, SchemaError> {
        parser::parse_rows(reader)
    }

    /// Local-file fallback for the remote schema export.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ParsedSchema, SchemaError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }
}
