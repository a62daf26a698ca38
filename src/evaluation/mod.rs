//! Evaluation harness
//!
//! Runs the pipeline under a fixed battery of perturbations and restores the dataset
//! afterwards on every exit path. Results land in the same metrics log as ordinary runs,
//! so the summary and the next run's feedback see them.

pub mod guards;
pub mod scenarios;
pub mod summary;

pub use guards::{RenameGuard, TempFileGuard};
pub use scenarios::{Scenario, ScenarioOutcome, ScenarioReport};
pub use summary::{EvaluationSummary, TagStats};

use tracing::{error, info, warn};

use crate::metrics::RunOutcome;
use crate::pipeline::PipelineExecutor;
use crate::tools::{cleaned_path, Table};
use crate::types::{AppResult, ErrorKind};

pub struct EvaluationHarness {
    executor: PipelineExecutor,
}

impl EvaluationHarness {
    pub fn new(executor: PipelineExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &PipelineExecutor {
        &self.executor
    }

    /// Run every scenario in order; one scenario's outcome never stops the next
    pub async fn run_all(&self) -> Vec<ScenarioReport> {
        let mut reports = Vec::new();
        for scenario in Scenario::battery(self.executor.config()) {
            let outcome = self.run_scenario(&scenario).await;
            match &outcome {
                ScenarioOutcome::Completed(run) => {
                    info!(scenario = %scenario, success = run.success, "Scenario completed")
                }
                ScenarioOutcome::Skipped { reason } => {
                    info!(scenario = %scenario, reason = %reason, "Scenario skipped")
                }
                ScenarioOutcome::Aborted { kind, message } => {
                    warn!(scenario = %scenario, kind = %kind, message = %message, "Scenario aborted")
                }
            }
            reports.push(ScenarioReport { scenario, outcome });
        }
        reports
    }

    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioOutcome {
        match scenario {
            Scenario::Baseline => self.baseline(scenario).await,
            Scenario::MissingDataset => self.missing_dataset(scenario).await,
            Scenario::MissingColumn(column) => self.missing_column(scenario, column).await,
            Scenario::LargeDataset => self.large_dataset(scenario).await,
        }
    }

    /// Aggregate of the full metrics log
    pub async fn summary(&self) -> AppResult<Option<EvaluationSummary>> {
        EvaluationSummary::from_log(self.executor.recorder().log_path()).await
    }

    async fn baseline(&self, scenario: &Scenario) -> ScenarioOutcome {
        into_outcome(
            self.executor
                .run_with_feedback(&scenario.run_tag(), None)
                .await,
        )
    }

    async fn missing_dataset(&self, scenario: &Scenario) -> ScenarioOutcome {
        let base = self.executor.config().paths.raw_dataset();
        if !base.is_file() {
            return ScenarioOutcome::skipped("Base dataset missing");
        }
        let backup = base.with_extension("bak");
        if backup.exists() {
            return ScenarioOutcome::skipped(format!(
                "Backup path {} already exists",
                backup.display()
            ));
        }

        let guard = match RenameGuard::hide(&base, &backup) {
            Ok(guard) => guard,
            Err(e) => return io_abort(format!("Could not hide dataset: {}", e)),
        };
        let result = self
            .executor
            .run_with_feedback(&scenario.run_tag(), Some(&base))
            .await;
        if let Err(e) = guard.restore() {
            error!(path = %base.display(), error = %e, "Dataset was not restored");
            return io_abort(format!(
                "Dataset {} could not be restored from {}: {}",
                base.display(),
                backup.display(),
                e
            ));
        }
        into_outcome(result)
    }

    async fn missing_column(&self, scenario: &Scenario, column: &str) -> ScenarioOutcome {
        let paths = &self.executor.config().paths;
        let base = paths.raw_dataset();
        if !base.is_file() {
            return ScenarioOutcome::skipped("Base dataset missing");
        }
        let table = match Table::read(&base) {
            Ok(table) => table,
            Err(e) => return ScenarioOutcome::skipped(format!("Base dataset unreadable: {:#}", e)),
        };
        let Some(variant_table) = table.without_column(column) else {
            return ScenarioOutcome::skipped(format!("Column '{}' already missing", column));
        };

        let variant = paths
            .data_dir
            .join(format!("{}_no_{}.csv", paths.dataset_hint, column));
        // The cleaning stage derives a second file from the variant
        let guard = TempFileGuard::new([variant.clone(), cleaned_path(&variant)]);
        if let Err(e) = variant_table.write(&variant) {
            return io_abort(format!("Could not write {}: {:#}", variant.display(), e));
        }

        let result = self
            .executor
            .run_with_feedback(&scenario.run_tag(), Some(&variant))
            .await;
        if let Err(e) = guard.remove() {
            error!(path = %variant.display(), error = %e, "Variant dataset was not removed");
        }
        into_outcome(result)
    }

    async fn large_dataset(&self, scenario: &Scenario) -> ScenarioOutcome {
        let large = self.executor.config().paths.large_dataset();
        if !large.is_file() {
            return ScenarioOutcome::skipped("Large dataset missing");
        }
        into_outcome(
            self.executor
                .run_with_feedback(&scenario.run_tag(), Some(&large))
                .await,
        )
    }
}

fn into_outcome(result: AppResult<RunOutcome>) -> ScenarioOutcome {
    match result {
        Ok(run) => ScenarioOutcome::Completed(run),
        Err(e) => ScenarioOutcome::Aborted {
            kind: e.kind(),
            message: e.to_string(),
        },
    }
}

fn io_abort(message: String) -> ScenarioOutcome {
    ScenarioOutcome::Aborted {
        kind: ErrorKind::IoFailure,
        message,
    }
}
