use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::metrics::{load_all, RunOutcome};
use crate::types::{AppResult, ErrorKind};

const RECENT_RUNS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagStats {
    pub runs: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub mean_duration_seconds: f64,
    pub failures_by_kind: BTreeMap<ErrorKind, usize>,
}

/// Aggregate view of the whole metrics log
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    pub total_runs: usize,
    pub by_tag: BTreeMap<String, TagStats>,
    /// Most recent runs by start time, oldest first
    pub recent: Vec<RunOutcome>,
}

impl EvaluationSummary {
    pub fn from_records(records: &[RunOutcome]) -> Self {
        let mut by_tag: BTreeMap<String, TagStats> = BTreeMap::new();
        let mut durations: BTreeMap<&str, f64> = BTreeMap::new();

        for record in records {
            let stats = by_tag.entry(record.run_tag.clone()).or_default();
            stats.runs += 1;
            if record.success {
                stats.successes += 1;
            } else {
                // Records written before kinds were tracked count as execution failures
                let kind = record.error_kind.unwrap_or(ErrorKind::ExecutionFailure);
                *stats.failures_by_kind.entry(kind).or_insert(0) += 1;
            }
            *durations.entry(record.run_tag.as_str()).or_insert(0.0) += record.duration_seconds;
        }

        for (tag, stats) in by_tag.iter_mut() {
            stats.success_rate = stats.successes as f64 / stats.runs as f64;
            stats.mean_duration_seconds =
                durations.get(tag.as_str()).copied().unwrap_or(0.0) / stats.runs as f64;
        }

        let mut sorted: Vec<&RunOutcome> = records.iter().collect();
        sorted.sort_by_key(|r| r.start_time);
        let recent = sorted[sorted.len().saturating_sub(RECENT_RUNS)..]
            .iter()
            .map(|r| (*r).clone())
            .collect();

        Self {
            total_runs: records.len(),
            by_tag,
            recent,
        }
    }

    /// `Ok(None)` when no log has been written yet
    pub async fn from_log(log_path: &Path) -> AppResult<Option<Self>> {
        Ok(load_all(log_path)
            .await?
            .map(|records| Self::from_records(&records)))
    }
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "====================")?;
        writeln!(f, " EVALUATION SUMMARY ")?;
        writeln!(f, "====================")?;

        if self.total_runs == 0 {
            return writeln!(f, "\nNo records found.");
        }

        writeln!(f, "\nTotal runs: {}", self.total_runs)?;
        writeln!(f, "\nRuns by tag:")?;
        writeln!(
            f,
            "  {:<20} {:>5} {:>13} {:>17}  failures",
            "tag", "runs", "success rate", "avg duration (s)"
        )?;
        for (tag, stats) in &self.by_tag {
            let failures = if stats.failures_by_kind.is_empty() {
                "-".to_string()
            } else {
                stats
                    .failures_by_kind
                    .iter()
                    .map(|(kind, n)| format!("{}={}", kind, n))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            writeln!(
                f,
                "  {:<20} {:>5} {:>13.2} {:>17.2}  {}",
                tag, stats.runs, stats.success_rate, stats.mean_duration_seconds, failures
            )?;
        }

        writeln!(f, "\nRecent runs:")?;
        for run in &self.recent {
            writeln!(
                f,
                "  {}  {:<20} {:>8.2}s  {}",
                run.start_time.format("%Y-%m-%d %H:%M:%S"),
                run.run_tag,
                run.duration_seconds,
                if run.success { "ok" } else { "FAILED" }
            )?;
        }
        Ok(())
    }
}
