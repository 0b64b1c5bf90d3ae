//! Roster import from an uploaded CSV document.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, RollcallError};
use crate::models::roster::RosterRow;

use super::RosterSource;

/// One CSV line. Headers are matched case-insensitively.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default, alias = "sis_user_id", alias = "student_id")]
    external_id: Option<String>,
    #[serde(default, alias = "email_address", alias = "e-mail")]
    email: Option<String>,
    #[serde(default, alias = "first", alias = "given_name")]
    first_name: Option<String>,
    #[serde(default, alias = "last", alias = "family_name", alias = "surname")]
    last_name: Option<String>,
}

impl From<CsvRow> for RosterRow {
    fn from(row: CsvRow) -> Self {
        RosterRow {
            external_id: row.external_id,
            email: row.email,
            first_name: row.first_name.unwrap_or_default(),
            last_name: row.last_name.unwrap_or_default(),
        }
    }
}

pub struct CsvRosterSource {
    name: String,
    data: Vec<u8>,
}

impl CsvRosterSource {
    pub fn from_bytes(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(&path.display().to_string(), data))
    }

    fn parse(&self) -> Result<Vec<RosterRow>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(self.data.as_slice());

        let headers = rdr
            .headers()
            .map_err(|e| RollcallError::Import(format!("CSV header error in {}: {e}", self.name)))?;
        let normalized: csv::StringRecord = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_lowercase().replace(' ', "_"))
            .collect();
        if !normalized.iter().any(|h| {
            matches!(
                h,
                "external_id" | "sis_user_id" | "student_id" | "email" | "email_address" | "e-mail"
            )
        }) {
            return Err(RollcallError::Import(format!(
                "{} has no external id or email column",
                self.name
            )));
        }
        rdr.set_headers(normalized);

        let mut rows = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| {
                RollcallError::Import(format!(
                    "CSV parse error in {} at row {}: {e}",
                    self.name,
                    line + 1
                ))
            })?;
            rows.push(row.into());
        }
        Ok(rows)
    }
}

#[async_trait]
impl RosterSource for CsvRosterSource {
    async fn fetch_rows(&self) -> Result<Vec<RosterRow>> {
        self.parse()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
