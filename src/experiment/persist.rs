//! Result files: one pretty-printed JSON array per partition.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::runner::Partition;
use super::ExperimentError;

/// Write one partition under `dir`, creating the directory if needed.
pub(crate) fn save_partition<R: Serialize>(
    dir: &Path,
    partition: &Partition<R>,
) -> Result<PathBuf, ExperimentError> {
    std::fs::create_dir_all(dir).map_err(|source| ExperimentError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(&partition.file_name);
    write_json(&path, &partition.records)?;
    tracing::info!(
        path = %path.display(),
        records = partition.records.len(),
        "saved results"
    );
    Ok(path)
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExperimentError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ExperimentError::Serde {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| ExperimentError::Io {
        path: path.to_path_buf(),
        source,
    })
}
