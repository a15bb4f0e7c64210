use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Country shown first when nothing else is configured.
pub const DEFAULT_COUNTRY: &str = "United States";

/// Where a country's schema, metrics and model live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryProfile {
    /// Target model name routed by the inference endpoint.
    pub model: String,
    /// Schema export URL.
    pub csv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook: Option<String>,
    pub cutoff: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum CountryConfigError {
    #[error("country configuration is empty")]
    Empty,
    #[error("country configuration is not a JSON object: {0}")]
    Json(#[source] serde_json::Error),
    #[error("country configuration lists no countries")]
    NoCountries,
}

/// Country profiles keyed and ordered by country name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CountryDirectory {
    profiles: BTreeMap<String, CountryProfile>,
}

impl CountryDirectory {
    /// Parses a spreadsheet export whose first cell holds the JSON blob.
    pub fn parse(text: &str) -> Result<Self, CountryConfigError> {
        if text.trim().is_empty() {
            return Err(CountryConfigError::Empty);
        }

        let profiles = match first_cell(text)
            .and_then(|cell| serde_json::from_str::<BTreeMap<String, CountryProfile>>(&cell).ok())
        {
            Some(profiles) => profiles,
            None => {
                debug!("first cell did not decode, falling back to line cleanup");
                let cleaned = clean_first_line(text);
                serde_json::from_str(&cleaned).map_err(CountryConfigError::Json)?
            }
        };

        if profiles.is_empty() {
            return Err(CountryConfigError::NoCountries);
        }
        for (country, profile) in &profiles {
            if !(0.0..=1.0).contains(&profile.cutoff) {
                warn!(
                    %country,
                    cutoff = profile.cutoff,
                    "cutoff outside the expected [0, 1] range"
                );
            }
        }

        info!(countries = profiles.len(), "country configuration loaded");
        Ok(Self { profiles })
    }

    pub fn get(&self, country: &str) -> Option<&CountryProfile> {
        self.profiles.get(country)
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn first_cell(text: &str) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let record = reader.records().next()?.ok()?;
    record.get(0).map(str::to_string)
}

/// Hand cleanup for exports the CSV reader cannot make sense of.
fn clean_first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    let line = line.strip_prefix('"').unwrap_or(line);
    let line = line.strip_suffix('"').unwrap_or(line);

    line.replace("\"\"", "\"")
        .trim()
        .trim_end_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB: &str = r#"{"United States": {"model": "us.tar.gz", "csv": "https://sheets/us", "metrics": "https://sheets/us-metrics", "cutoff": 0.5}, "Kenya": {"model": "ke.tar.gz", "csv": "https://sheets/ke", "notebook": "https://nb/ke", "cutoff": 0.35}}"#;

    fn csv_export(blob: &str) -> String {
        format!("\"{}\"\n", blob.replace('"', "\"\""))
    }

    #[test]
    fn reads_first_cell_of_csv_export() {
        let directory = CountryDirectory::parse(&csv_export(BLOB)).expect("directory");
        assert_eq!(directory.names(), vec!["Kenya", "United States"]);

        let us = directory.get(DEFAULT_COUNTRY).expect("default country");
        assert_eq!(us.model, "us.tar.gz");
        assert_eq!(us.metrics.as_deref(), Some("https://sheets/us-metrics"));
        assert_eq!(us.notebook, None);
        assert_eq!(directory.get("Kenya").map(|kenya| kenya.cutoff), Some(0.35));
    }

    #[test]
    fn accepts_an_unquoted_blob() {
        let directory = CountryDirectory::parse(BLOB).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn falls_back_to_line_cleanup_for_stray_trailing_quotes() {
        let text = format!("\"{}\"'\n,,\n", BLOB.replace('"', "\"\""));
        let directory = CountryDirectory::parse(&text).expect("cleaned directory");
        assert!(directory.get("Kenya").is_some());
    }

    #[test]
    fn rejects_garbage_and_empty_input() {
        assert!(matches!(
            CountryDirectory::parse("   \n"),
            Err(CountryConfigError::Empty)
        ));
        assert!(matches!(
            CountryDirectory::parse("not json at all"),
            Err(CountryConfigError::Json(_))
        ));
        assert!(matches!(
            CountryDirectory::parse("{}"),
            Err(CountryConfigError::NoCountries)
        ));
    }

    #[test]
    fn cutoffs_outside_the_unit_interval_are_kept() {
        let blob = r#"{"Chile": {"model": "cl", "csv": "https://sheets/cl", "cutoff": 1.5}, "Peru": {"model": "pe", "csv": "https://sheets/pe", "cutoff": 0.4}}"#;
        let directory = CountryDirectory::parse(blob).expect("directory parses");
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get("Chile").map(|profile| profile.cutoff), Some(1.5));
    }
}
