use serde::Serialize;
use tracing::debug;

/// A metrics cell: numeric when it parses as one, verbatim otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    fn from_cell(cell: &str) -> Self {
        match cell.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            _ => Self::Text(cell.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
}

/// Evaluation metrics published next to a country's model. Display only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModelMetrics {
    entries: Vec<Metric>,
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metrics file is unreadable: {0}")]
    Csv(#[from] csv::Error),
    #[error("metrics file has a header but no values")]
    MissingValues,
}

impl ModelMetrics {
    /// Header line plus one value line; extra lines are ignored.
    pub fn parse(text: &str) -> Result<Self, MetricsError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.trim().as_bytes());

        let headers = reader.headers()?.clone();
        let values = reader
            .records()
            .next()
            .ok_or(MetricsError::MissingValues)??;

        let entries: Vec<Metric> = headers
            .iter()
            .zip(values.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, cell)| Metric {
                name: name.to_string(),
                value: MetricValue::from_cell(cell),
            })
            .collect();

        debug!(metrics = entries.len(), "model metrics parsed");
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|metric| metric.name == name)
            .map(|metric| &metric.value)
    }

    pub fn entries(&self) -> &[Metric] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
