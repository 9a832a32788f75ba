//! Attempt-record persistence.
//!
//! The harness appends one JSON object per line to a per-model log named
//! `results_<model>_<timestamp>.txt`. Combining concatenates every such log
//! in a directory into one JSON array, the corpus the statistics are built
//! from.

use crate::record::AttemptRecord;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix shared by every per-model log
pub const LOG_PREFIX: &str = "results_";

/// Default corpus file name
pub const CORPUS_FILE: &str = "results.txt";

/// Errors that can occur reading or writing results
#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid record in {path} line {line}: {source}")]
    InvalidRecord {
        path: String,
        line: usize,
        source: serde_json::Error,
    },

    #[error("Failed to parse corpus: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Append-only log of one model's attempts
#[derive(Debug)]
pub struct ResultLog {
    path: PathBuf,
    file: File,
}

impl ResultLog {
    /// Create (or reopen for appending) the log for `model` in `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn create(dir: &Path, model: &str, timestamp: &str) -> Result<Self, ResultsError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(model, timestamp));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), model = %model, "Opened result log");
        Ok(Self { path, file })
    }

    /// Append one record as a JSON line
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn append(&mut self, record: &AttemptRecord) -> Result<(), ResultsError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }

    /// Log file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Log file name for `model`; path separators and tag colons become `_`
#[must_use]
pub fn log_file_name(model: &str, timestamp: &str) -> String {
    let sanitized: String = model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{LOG_PREFIX}{sanitized}_{timestamp}.txt")
}

/// Parse the JSON lines of one log, skipping blank lines
///
/// # Errors
///
/// Returns an error naming the file and line of the first invalid record.
pub fn read_log(path: &Path) -> Result<Vec<AttemptRecord>, ResultsError> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| ResultsError::InvalidRecord {
                path: path.display().to_string(),
                line: i + 1,
                source,
            })
        })
        .collect()
}

/// Read every per-model log in `dir`, in file-name order
///
/// # Errors
///
/// Returns an error if a log cannot be read or holds an invalid record.
pub fn combine_results(dir: &Path) -> Result<Vec<AttemptRecord>, ResultsError> {
    // The directory is literal; only the file name is a pattern
    let base = PathBuf::from(glob::Pattern::escape(&dir.to_string_lossy()));
    let pattern = base.join(format!("{LOG_PREFIX}*.txt"));
    let mut paths: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in &paths {
        let mut batch = read_log(path)?;
        tracing::debug!(path = %path.display(), records = batch.len(), "Read result log");
        records.append(&mut batch);
    }

    tracing::info!(logs = paths.len(), records = records.len(), "Combined result logs");
    Ok(records)
}

/// Write the consolidated corpus as a JSON array
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_corpus(path: &Path, records: &[AttemptRecord]) -> Result<(), ResultsError> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a corpus written by [`write_corpus`]
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of records.
pub fn load_corpus(path: &Path) -> Result<Vec<AttemptRecord>, ResultsError> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<AttemptRecord> = serde_json::from_str(&content)?;
    let inconsistent = records.iter().filter(|r| !r.is_consistent()).count();
    if inconsistent > 0 {
        tracing::warn!(
            path = %path.display(),
            inconsistent,
            "Corpus holds records whose scores disagree with their flags"
        );
    }
    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::validate::Validation;
    use tempfile::TempDir;

    fn record(model: &str, level: u32, iteration: u32) -> AttemptRecord {
        let validation = Validation {
            has_valid_json_format: true,
            has_valid_schema: true,
            has_valid_data: false,
        };
        AttemptRecord::new(model, level, iteration, Some(1_000), validation)
    }

    #[test]
    fn test_log_file_name_sanitized() {
        assert_eq!(
            log_file_name("qwen2.5:7b", "20240101T000000"),
            "results_qwen2.5_7b_20240101T000000.txt"
        );
        assert_eq!(
            log_file_name("hf.co/org/model:q4", "1"),
            "results_hf.co_org_model_q4_1.txt"
        );
    }

    #[test]
    fn test_append_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let mut log = ResultLog::create(dir.path(), "gemma2:2b", "1").unwrap();
        log.append(&record("gemma2:2b", 1, 1)).unwrap();
        log.append(&record("gemma2:2b", 1, 2)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|l| l.starts_with('{')));

        let records = read_log(log.path()).unwrap();
        assert_eq!(records[1].iteration, 2);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        {
            let mut log = ResultLog::create(dir.path(), "m:1b", "1").unwrap();
            log.append(&record("m:1b", 1, 1)).unwrap();
        }
        let mut log = ResultLog::create(dir.path(), "m:1b", "1").unwrap();
        log.append(&record("m:1b", 1, 2)).unwrap();
        assert_eq!(read_log(log.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_combine_in_file_name_order() {
        let dir = TempDir::new().unwrap();
        let mut b = ResultLog::create(dir.path(), "b:2b", "1").unwrap();
        b.append(&record("b:2b", 1, 1)).unwrap();
        let mut a = ResultLog::create(dir.path(), "a:1b", "1").unwrap();
        a.append(&record("a:1b", 1, 1)).unwrap();
        a.append(&record("a:1b", 2, 1)).unwrap();

        std::fs::write(dir.path().join("notes.txt"), "not a log").unwrap();

        let records = combine_results(dir.path()).unwrap();
        let models: Vec<_> = records.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(models, vec!["a:1b", "a:1b", "b:2b"]);
    }

    #[test]
    fn test_combine_directory_with_glob_characters() {
        let root = TempDir::new().unwrap();
        for name in ["run[1]", "run*", "run?"] {
            let dir = root.path().join(name);
            std::fs::create_dir(&dir).unwrap();
            let mut log = ResultLog::create(&dir, "m:1b", "t").unwrap();
            log.append(&record("m:1b", 1, 1)).unwrap();

            let records = combine_results(&dir).unwrap();
            assert_eq!(records.len(), 1, "{name}");
        }
    }

    #[test]
    fn test_blank_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let line = serde_json::to_string(&record("m:1b", 1, 1)).unwrap();
        std::fs::write(
            dir.path().join("results_m_1b_1.txt"),
            format!("\n{line}\n   \n{line}\n"),
        )
        .unwrap();
        assert_eq!(combine_results(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_line_reports_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results_m_1b_1.txt");
        std::fs::write(&path, "{\"model\":\"m:1b\"}\n").unwrap();
        let err = combine_results(dir.path()).unwrap_err();
        assert!(matches!(err, ResultsError::InvalidRecord { line: 1, .. }));
    }

    #[test]
    fn test_combine_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(combine_results(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_corpus_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CORPUS_FILE);
        let records = vec![record("a:1b", 1, 1), AttemptRecord::failed("a:1b", 2, 1)];
        write_corpus(&path, &records).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim_start().starts_with('['));
        assert_eq!(load_corpus(&path).unwrap(), records);
    }

    #[test]
    fn test_load_missing_corpus() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_corpus(&dir.path().join("missing.txt")),
            Err(ResultsError::IoError(_))
        ));
    }
}
