use std::fmt;

use crate::config::Config;
use crate::metrics::RunOutcome;
use crate::types::ErrorKind;

/// One perturbation of the dataset or environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scenario {
    Baseline,
    /// Dataset file renamed away for the duration of the run
    MissingDataset,
    /// Run against a copy of the dataset without this column
    MissingColumn(String),
    /// Run against the oversized variant, when one exists
    LargeDataset,
}

impl Scenario {
    /// The fixed battery, in execution order
    pub fn battery(config: &Config) -> Vec<Scenario> {
        vec![
            Scenario::Baseline,
            Scenario::MissingDataset,
            Scenario::MissingColumn(config.eval.required_column.clone()),
            Scenario::LargeDataset,
        ]
    }

    pub fn run_tag(&self) -> String {
        match self {
            Scenario::Baseline => "baseline".to_string(),
            Scenario::MissingDataset => "missing_dataset".to_string(),
            Scenario::MissingColumn(column) => format!("missing_{}", column),
            Scenario::LargeDataset => "large_dataset".to_string(),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.run_tag())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioOutcome {
    /// The pipeline ran; the run itself may still have failed
    Completed(RunOutcome),
    /// A precondition was not met and the pipeline was not invoked
    Skipped { reason: String },
    /// The run could not be recorded normally, e.g. the report could not be written
    Aborted { kind: ErrorKind, message: String },
}

impl ScenarioOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ScenarioOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ScenarioOutcome::Skipped { .. })
    }

    pub fn run(&self) -> Option<&RunOutcome> {
        match self {
            ScenarioOutcome::Completed(run) => Some(run),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ScenarioOutcome::Completed(run) => run.error_kind,
            ScenarioOutcome::Skipped { .. } => Some(ErrorKind::PreconditionSkip),
            ScenarioOutcome::Aborted { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub outcome: ScenarioOutcome,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ScenarioOutcome::Completed(run) if run.success => write!(
                f,
                "{:<20} completed in {:.2}s, report {}",
                self.scenario, run.duration_seconds, run.report_file
            ),
            ScenarioOutcome::Completed(run) => write!(
                f,
                "{:<20} failed after {:.2}s: {}",
                self.scenario,
                run.duration_seconds,
                run.error_message.as_deref().unwrap_or("unknown error")
            ),
            ScenarioOutcome::Skipped { reason } => {
                write!(f, "{:<20} skipped: {}", self.scenario, reason)
            }
            ScenarioOutcome::Aborted { kind, message } => {
                write!(f, "{:<20} aborted ({}): {}", self.scenario, kind, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_battery_follows_required_column() {
        let mut config = Config::for_root(Path::new("/tmp/eval"));
        config.eval.required_column = "orders".to_string();
        let tags: Vec<String> = Scenario::battery(&config).iter().map(Scenario::run_tag).collect();
        assert_eq!(
            tags,
            vec!["baseline", "missing_dataset", "missing_orders", "large_dataset"]
        );
    }

    #[test]
    fn test_skip_is_distinct_from_failure() {
        let skipped = ScenarioOutcome::skipped("Large dataset missing");
        assert!(skipped.is_skipped());
        assert!(skipped.run().is_none());
        assert_eq!(skipped.error_kind(), Some(ErrorKind::PreconditionSkip));

        let report = ScenarioReport {
            scenario: Scenario::LargeDataset,
            outcome: skipped,
        };
        assert!(report.to_string().contains("skipped: Large dataset missing"));
    }
}
