//! Feedback from earlier runs
//!
//! Condenses the tail of the metrics log into a short paragraph that the planning stage
//! reads before deciding how to approach the next run.

use std::fmt;
use std::path::Path;

use tracing::warn;

use crate::metrics::{load_all, RunOutcome};

pub const FIRST_RUN_MESSAGE: &str =
    "No prior evaluation runs found. You are running the workflow for the first time.";
pub const UNPARSABLE_LOG_MESSAGE: &str =
    "Evaluation log exists but could not be parsed. Assume there may have been past failures.";
pub const EMPTY_LOG_MESSAGE: &str = "Evaluation log is empty. No feedback available.";

const MAX_DISTINCT_ERRORS: usize = 3;
const ERROR_PREVIEW_CHARS: usize = 140;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackSummary {
    pub total: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub distinct_recent_errors: Vec<String>,
}

impl FeedbackSummary {
    /// Summarize the `max_runs` most recent records by start time
    pub fn from_records(records: &[RunOutcome], max_runs: usize) -> Self {
        let mut sorted: Vec<&RunOutcome> = records.iter().collect();
        sorted.sort_by_key(|r| r.start_time);
        let recent = &sorted[sorted.len().saturating_sub(max_runs)..];

        let total = recent.len();
        let successes = recent.iter().filter(|r| r.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64
        };

        let failures = recent
            .iter()
            .filter(|r| !r.success)
            .filter_map(|r| r.error_message.as_deref());

        Self {
            total,
            successes,
            success_rate,
            distinct_recent_errors: distinct_errors(failures),
        }
    }
}

impl fmt::Display for FeedbackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Recent runs analyzed. {} total, success rate {:.2}.",
            self.total, self.success_rate
        )?;
        if self.distinct_recent_errors.is_empty() {
            write!(f, "No recurring runtime errors detected in recent runs.")
        } else {
            write!(f, "Common recent errors.")?;
            for (i, error) in self.distinct_recent_errors.iter().enumerate() {
                write!(f, "\n  {}. {}", i + 1, error)?;
            }
            Ok(())
        }
    }
}

/// First-seen order, duplicates dropped, at most three, each trimmed to a preview
pub fn distinct_errors<'a>(messages: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    for message in messages {
        if !seen.contains(&message) {
            seen.push(message);
        }
        if seen.len() == MAX_DISTINCT_ERRORS {
            break;
        }
    }
    seen.into_iter().map(preview).collect()
}

fn preview(message: &str) -> String {
    if message.chars().count() <= ERROR_PREVIEW_CHARS {
        return message.to_string();
    }
    let head: String = message.chars().take(ERROR_PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Feedback text for the next run. Never fails: an unreadable log yields a fixed message.
pub async fn summarize(log_path: &Path, max_runs: usize) -> String {
    match load_all(log_path).await {
        Ok(None) => FIRST_RUN_MESSAGE.to_string(),
        Ok(Some(records)) if records.is_empty() => EMPTY_LOG_MESSAGE.to_string(),
        Ok(Some(records)) => FeedbackSummary::from_records(&records, max_runs).to_string(),
        Err(e) => {
            warn!(path = %log_path.display(), error = %e, "Could not read metrics log for feedback");
            UNPARSABLE_LOG_MESSAGE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRecorder;
    use crate::types::AppError;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn record(offset_secs: i64, error: Option<&str>) -> RunOutcome {
        let start = Utc::now() + Duration::seconds(offset_secs);
        match error {
            None => RunOutcome::succeeded("t", start, start, Path::new("r.txt"), vec![]),
            Some(message) => RunOutcome::failed(
                "t",
                start,
                start,
                Path::new("r.txt"),
                &AppError::LLMApi(message.to_string()),
            ),
        }
    }

    #[test]
    fn test_distinct_errors_keep_first_seen_order() {
        let errors = distinct_errors(["A", "B", "A", "C", "D"]);
        assert_eq!(errors, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_long_errors_are_truncated() {
        let long = "x".repeat(200);
        let errors = distinct_errors([long.as_str()]);
        assert_eq!(errors[0].len(), 143);
        assert!(errors[0].ends_with("..."));
    }

    #[test]
    fn test_window_uses_most_recent_by_start_time() {
        // Out of file order on purpose
        let records = vec![
            record(10, None),
            record(0, Some("old failure")),
            record(20, Some("new failure")),
            record(5, Some("older failure")),
        ];
        let summary = FeedbackSummary::from_records(&records, 2);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.successes, 1);
        assert_eq!(summary.success_rate, 0.5);
        assert_eq!(summary.distinct_recent_errors, vec!["LLM API error: new failure"]);
    }

    #[test]
    fn test_render() {
        let summary = FeedbackSummary {
            total: 4,
            successes: 3,
            success_rate: 0.75,
            distinct_recent_errors: vec!["boom".to_string()],
        };
        assert_eq!(
            summary.to_string(),
            "Recent runs analyzed. 4 total, success rate 0.75.\nCommon recent errors.\n  1. boom"
        );

        let clean = FeedbackSummary {
            total: 1,
            successes: 1,
            success_rate: 1.0,
            distinct_recent_errors: vec![],
        };
        assert!(clean.to_string().ends_with("No recurring runtime errors detected in recent runs."));
    }

    #[tokio::test]
    async fn test_summarize_log_states() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.jsonl");
        assert_eq!(summarize(&path, 5).await, FIRST_RUN_MESSAGE);

        tokio::fs::write(&path, "\n").await.unwrap();
        assert_eq!(summarize(&path, 5).await, EMPTY_LOG_MESSAGE);

        tokio::fs::write(&path, "garbage\nmore garbage\n").await.unwrap();
        assert_eq!(summarize(&path, 5).await, UNPARSABLE_LOG_MESSAGE);

        // A single bad line is still a log that exists but cannot be read
        tokio::fs::write(&path, "this is not json\n").await.unwrap();
        assert_eq!(summarize(&path, 5).await, UNPARSABLE_LOG_MESSAGE);
        tokio::fs::write(&path, "{\"run_tag\":\"hal").await.unwrap();
        assert_eq!(summarize(&path, 5).await, UNPARSABLE_LOG_MESSAGE);

        tokio::fs::remove_file(&path).await.unwrap();
        MetricsRecorder::new(&path).append(&record(0, None)).await.unwrap();
        let text = summarize(&path, 5).await;
        assert!(text.starts_with("Recent runs analyzed. 1 total, success rate 1.00."));
    }
}
