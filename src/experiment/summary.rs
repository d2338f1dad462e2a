//! Per-variant accuracy summaries.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::persist::write_json;
use super::record::{Graded, ResultRecord, SelfConsistencyRecord};
use super::runner::Partition;
use super::ExperimentError;
use crate::scoring::Tally;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub file: String,
    pub llm: String,
    pub variant: String,
    #[serde(flatten)]
    pub tally: Tally,
    pub accuracy: f64,
}

impl VariantSummary {
    fn from_records<R: Graded>(
        file: impl Into<String>,
        llm: impl Into<String>,
        variant: impl Into<String>,
        records: &[R],
    ) -> Self {
        let mut tally = Tally::default();
        for record in records {
            tally.record(record.answer(), record.is_correct());
        }
        Self {
            file: file.into(),
            llm: llm.into(),
            variant: variant.into(),
            tally,
            accuracy: tally.accuracy(),
        }
    }

    pub fn from_partition<R: Graded>(partition: &Partition<R>) -> Self {
        Self::from_records(
            partition.file_name.as_str(),
            partition.llm.as_str(),
            partition.variant.as_str(),
            &partition.records,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub run_id: Uuid,
    pub experiment: String,
    pub created_at: DateTime<Utc>,
    pub variants: Vec<VariantSummary>,
}

impl ExperimentSummary {
    pub fn new<R: Graded>(experiment: &str, run_id: Uuid, partitions: &[Partition<R>]) -> Self {
        Self {
            run_id,
            experiment: experiment.to_string(),
            created_at: Utc::now(),
            variants: partitions.iter().map(VariantSummary::from_partition).collect(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("summary_{}.json", self.experiment)
    }

    /// Write `summary_{experiment}.json` under `dir`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, ExperimentError> {
        let path = dir.join(self.file_name());
        write_json(&path, self)?;
        tracing::info!(path = %path.display(), "saved summary");
        Ok(path)
    }

    /// One stderr line per variant.
    pub fn report(&self) {
        for v in &self.variants {
            eprintln!(
                "[{}] {} | {} | {}/{} correct ({:.1}%), {} unanswered",
                self.experiment,
                v.llm,
                v.variant,
                v.tally.correct,
                v.tally.total,
                v.accuracy * 100.0,
                v.tally.unanswered
            );
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecords {
    SelfConsistency(Vec<SelfConsistencyRecord>),
    Graded(Vec<ResultRecord>),
}

/// Tally every `*results_*.json` file in `dir`, in file-name order.
///
/// Empty result files carry no model or variant and are skipped.
pub fn summarize_dir(dir: &Path) -> Result<Vec<VariantSummary>, ExperimentError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("results_") && n.ends_with(".json"))
        })
        .collect();
    files.sort();

    let mut summaries = Vec::with_capacity(files.len());
    for path in files {
        let raw = std::fs::read_to_string(&path).map_err(io_error(&path))?;
        let stored: StoredRecords =
            serde_json::from_str(&raw).map_err(|source| ExperimentError::Serde {
                path: path.clone(),
                source,
            })?;
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let summary = match stored {
            StoredRecords::SelfConsistency(records) => records
                .first()
                .map(|r| VariantSummary::from_records(&file, r.llm(), "selfconsistency", &records)),
            StoredRecords::Graded(records) => records.first().map(|r| {
                VariantSummary::from_records(&file, r.llm(), r.variant.to_string(), &records)
            }),
        };
        match summary {
            Some(summary) => summaries.push(summary),
            None => tracing::warn!(file = %file, "skipping empty result file"),
        }
    }
    Ok(summaries)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExperimentError {
    let path = path.to_path_buf();
    move |source| ExperimentError::Io { path, source }
}
