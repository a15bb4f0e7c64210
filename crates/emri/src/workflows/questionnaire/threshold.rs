use super::domain::AnswerValue;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Strict comparison supported by recommendation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOperator {
    LessThan,
    GreaterThan,
}

/// Parsed `"< N"` / `"> N"` rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub operator: ThresholdOperator,
    pub value: f64,
}

fn threshold_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([<>])\s*(\d+(?:\.\d+)?)$").expect("threshold pattern compiles")
    })
}

impl Threshold {
    /// Anything outside the two-operator grammar (`<=`, `==`, a bare number)
    /// does not parse.
    pub fn parse(raw: &str) -> Option<Self> {
        let captures = threshold_pattern().captures(raw.trim())?;
        let operator = match &captures[1] {
            "<" => ThresholdOperator::LessThan,
            _ => ThresholdOperator::GreaterThan,
        };
        let value = captures[2].parse::<f64>().ok()?;
        Some(Self { operator, value })
    }

    pub fn matches(&self, answer: f64) -> bool {
        match self.operator {
            ThresholdOperator::LessThan => answer < self.value,
            ThresholdOperator::GreaterThan => answer > self.value,
        }
    }
}

/// Whether `answer` trips the recommendation rule `threshold`.
///
/// Absent rules, absent answers, unparseable rules and non-numeric answers
/// all evaluate to `false`.
pub fn check_threshold(threshold: Option<&str>, answer: Option<&AnswerValue>) -> bool {
    let (Some(raw), Some(answer)) = (threshold, answer) else {
        return false;
    };
    if raw.trim().is_empty() {
        return false;
    }

    let Some(rule) = Threshold::parse(raw) else {
        debug!(threshold = raw, "threshold does not match the comparison grammar");
        return false;
    };
    let Some(number) = answer.as_number() else {
        return false;
    };

    rule.matches(number)
}
