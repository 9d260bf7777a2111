//! CSV loss tables.
//!
//! A loss table is a headed CSV file with at least a `run_name` and a `loss`
//! column. A `tokens` column is optional; any other column is ignored.

use crate::error::{ReplayError, ReplayResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

pub const RUN_NAME_COLUMN: &str = "run_name";
pub const LOSS_COLUMN: &str = "loss";
pub const TOKENS_COLUMN: &str = "tokens";

/// A single measurement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub run_name: String,
    /// An empty cell reads as NaN and is logged as a gap.
    #[serde(deserialize_with = "empty_as_nan")]
    pub loss: f64,
    /// Number of tokens seen at this measurement, used as the x-axis when present.
    #[serde(default)]
    pub tokens: Option<f64>,
}

/// A fully loaded loss file.
#[derive(Debug, Clone)]
pub struct LossTable {
    path: PathBuf,
    has_tokens_column: bool,
    records: Vec<LossRecord>,
}

impl LossTable {
    /// Read a loss table from disk.
    ///
    /// Fails with `MissingFile` when the path does not exist and with
    /// `MissingColumn` when a required header is absent. A row that cannot be
    /// parsed fails the whole table with its line number.
    pub fn read(path: &Path) -> ReplayResult<Self> {
        if !path.exists() {
            return Err(ReplayError::MissingFile(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let file = display_name(path);
        let headers = reader.headers()?.clone();
        for column in [RUN_NAME_COLUMN, LOSS_COLUMN] {
            if !headers.iter().any(|h| h == column) {
                return Err(ReplayError::MissingColumn { file, column });
            }
        }
        let has_tokens_column = headers.iter().any(|h| h == TOKENS_COLUMN);

        let mut records = Vec::new();
        for result in reader.deserialize::<LossRecord>() {
            let record = result.map_err(|e| match e.kind() {
                csv::ErrorKind::Deserialize { pos, err } => ReplayError::InvalidRecord {
                    line: pos.as_ref().map_or(0, csv::Position::line),
                    reason: err.to_string(),
                },
                _ => ReplayError::Csv(e),
            })?;
            records.push(record);
        }

        Ok(Self { path: path.to_path_buf(), has_tokens_column, records })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn has_tokens_column(&self) -> bool {
        self.has_tokens_column
    }

    #[must_use]
    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<LossRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn empty_as_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}
