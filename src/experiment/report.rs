// src/experiment/report.rs

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::engine::JobRecord;
use crate::errors::Result;

/// Minute-resolution local time stamp used in directory and file names.
pub fn timestamp_suffix() -> String {
    Local::now().format("%Y-%m-%d-%H-%M").to_string()
}

/// `<output_dir>/exp_<name>_<stamp>`
pub fn experiment_dir(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("exp_{}_{}", name, timestamp_suffix()))
}

/// Create (if needed) the experiment directory and return its path.
pub fn create_experiment_dir(output_dir: &Path, name: &str) -> Result<PathBuf> {
    let dir = experiment_dir(output_dir, name);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Everything one experiment produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    pub exp_item: String,
    pub result: Vec<JobRecord>,
}

/// Write `<dir>/<exp_item>_<stamp>.json` and return its path.
///
/// A second result for the same experiment within the same minute gets a
/// numeric suffix instead of replacing the first.
pub fn write_result(dir: &Path, result: &ExperimentResult) -> Result<PathBuf> {
    let stem = format!("{}_{}", result.exp_item, timestamp_suffix());
    let mut path = dir.join(format!("{stem}.json"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}-{n}.json"));
        n += 1;
    }

    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(&mut writer, result)?;
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_dir_is_named_after_the_set() {
        let dir = experiment_dir(Path::new("/tmp/out"), "nvme");
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("exp_nvme_"));
        // exp_nvme_YYYY-mm-dd-HH-MM
        assert_eq!(name.len(), "exp_nvme_".len() + 16);
        assert_eq!(dir.parent(), Some(Path::new("/tmp/out")));
    }

    #[test]
    fn results_never_overwrite_each_other() {
        let tmp = tempfile::tempdir().unwrap();
        let result = ExperimentResult {
            exp_item: "read".into(),
            result: Vec::new(),
        };
        let first = write_result(tmp.path(), &result).unwrap();
        let second = write_result(tmp.path(), &result).unwrap();
        assert_ne!(first, second);

        let text = fs::read_to_string(&first).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["exp_item"], "read");
        assert_eq!(value["result"], serde_json::json!([]));
    }
}
