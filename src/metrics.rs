//! Run metrics
//!
//! One JSON object per line in `outputs/eval/metrics.jsonl`, appended after every run and
//! never rewritten. The feedback summarizer and the evaluation summary both read it back.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{info, warn};

use crate::types::{AppError, AppResult, ErrorKind};

/// Record of one pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_tag: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub report_file: String,
    pub success: bool,
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    /// Stages whose tools returned error-shaped contracts during a successful run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contract_errors: Vec<String>,
}

impl RunOutcome {
    pub fn succeeded(
        run_tag: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        report_file: &Path,
        contract_errors: Vec<String>,
    ) -> Self {
        Self {
            run_tag: run_tag.to_string(),
            start_time,
            end_time,
            duration_seconds: seconds_between(start_time, end_time),
            report_file: report_file.display().to_string(),
            success: true,
            error_message: None,
            error_kind: None,
            contract_errors,
        }
    }

    pub fn failed(
        run_tag: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        report_file: &Path,
        error: &AppError,
    ) -> Self {
        Self {
            run_tag: run_tag.to_string(),
            start_time,
            end_time,
            duration_seconds: seconds_between(start_time, end_time),
            report_file: report_file.display().to_string(),
            success: false,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind()),
            contract_errors: Vec::new(),
        }
    }
}

/// Elapsed seconds, clamped at zero if the clock stepped backwards
fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let elapsed = end - start;
    let micros = elapsed
        .num_microseconds()
        .unwrap_or_else(|| elapsed.num_milliseconds().saturating_mul(1000));
    (micros.max(0) as f64) / 1_000_000.0
}

/// Append-only writer for the metrics log
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    log_path: PathBuf,
}

impl MetricsRecorder {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Append one record as a single line. Earlier lines are never touched; a cut-off
    /// final line is terminated first so the new record starts on a line of its own.
    pub async fn append(&self, outcome: &RunOutcome) -> AppResult<()> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(outcome)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        if !ends_with_newline(&mut file).await? {
            warn!(path = %self.log_path.display(), "Metrics log ends mid-line, terminating it");
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!(
            run_tag = %outcome.run_tag,
            success = outcome.success,
            duration = outcome.duration_seconds,
            "Recorded run metrics"
        );
        Ok(())
    }
}

/// True for an empty file or one whose last byte is a newline
async fn ends_with_newline(file: &mut fs::File) -> AppResult<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

/// Read every record in the log. Returns `Ok(None)` when the log does not exist.
///
/// Blank lines are ignored. A line the JSON parser hit end-of-input on is a write cut off
/// by a crash and is skipped. Any other malformed line fails with [`AppError::LogParse`],
/// as does a log in which nothing but cut-off lines were found.
pub async fn load_all(log_path: &Path) -> AppResult<Option<Vec<RunOutcome>>> {
    if !fs::try_exists(log_path).await? {
        return Ok(None);
    }

    let content = fs::read_to_string(log_path).await?;
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    let mut records = Vec::with_capacity(lines.len());
    let mut first_cut_off = None;
    for (line_no, text) in lines {
        match serde_json::from_str::<RunOutcome>(text) {
            Ok(record) => records.push(record),
            Err(e) if e.is_eof() => {
                warn!(line = line_no, error = %e, "Skipping cut-off metrics line");
                if first_cut_off.is_none() {
                    first_cut_off = Some((line_no, e.to_string()));
                }
            }
            Err(e) => {
                return Err(AppError::LogParse {
                    line: line_no,
                    message: e.to_string(),
                })
            }
        }
    }

    match first_cut_off {
        Some((line, message)) if records.is_empty() => Err(AppError::LogParse { line, message }),
        _ => Ok(Some(records)),
    }
}
