use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use sales_analyst::agents::{Narrator, OfflineNarrator, StageBrief};
use sales_analyst::datagen;
use sales_analyst::evaluation::{EvaluationHarness, Scenario, ScenarioOutcome};
use sales_analyst::{AppError, AppResult, Config, ErrorKind, PipelineExecutor};

fn harness(dir: &TempDir) -> (Config, EvaluationHarness) {
    let config = Config::for_root(dir.path());
    let executor = PipelineExecutor::new(config.clone(), Arc::new(OfflineNarrator));
    (config, EvaluationHarness::new(executor))
}

struct BrokenNarrator;

#[async_trait]
impl Narrator for BrokenNarrator {
    async fn narrate(&self, _brief: &StageBrief) -> AppResult<String> {
        Err(AppError::LLMApi("connection refused".to_string()))
    }
}

fn write_sample(config: &Config) -> String {
    let table = datagen::generate(datagen::DEFAULT_SEED).unwrap();
    datagen::write_dataset(&config.paths.raw_dataset(), &table).unwrap();
    std::fs::read_to_string(config.paths.raw_dataset()).unwrap()
}

#[tokio::test]
async fn missing_dataset_scenario_restores_file() {
    let dir = TempDir::new().unwrap();
    let (config, harness) = harness(&dir);
    let original = write_sample(&config);

    let outcome = harness.run_scenario(&Scenario::MissingDataset).await;
    let run = outcome.run().expect("scenario should have run");
    assert_eq!(run.run_tag, "missing_dataset");
    assert!(run.contract_errors.contains(&"load".to_string()));

    let restored = std::fs::read_to_string(config.paths.raw_dataset()).unwrap();
    assert_eq!(restored, original);
    assert!(!config.paths.raw_dataset().with_extension("bak").exists());
}

#[tokio::test]
async fn missing_dataset_is_restored_after_failed_run() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    let original = write_sample(&config);
    let executor = PipelineExecutor::new(config.clone(), Arc::new(BrokenNarrator));
    let harness = EvaluationHarness::new(executor);

    let outcome = harness.run_scenario(&Scenario::MissingDataset).await;
    let run = outcome.run().expect("scenario should have run");
    assert!(!run.success);
    assert_eq!(run.error_kind, Some(ErrorKind::ExecutionFailure));

    let restored = std::fs::read_to_string(config.paths.raw_dataset()).unwrap();
    assert_eq!(restored, original);
    assert!(!config.paths.raw_dataset().with_extension("bak").exists());
}

#[tokio::test]
async fn missing_column_scenario_removes_variant() {
    let dir = TempDir::new().unwrap();
    let (config, harness) = harness(&dir);
    write_sample(&config);

    let outcome = harness
        .run_scenario(&Scenario::MissingColumn("revenue".to_string()))
        .await;
    let run = outcome.run().expect("scenario should have run");
    assert_eq!(run.run_tag, "missing_revenue");
    assert!(run.contract_errors.contains(&"analyze".to_string()));

    let variant = config.paths.data_dir.join("ecommerce_q3_2024_no_revenue.csv");
    assert!(!variant.exists());
    assert!(!config
        .paths
        .data_dir
        .join("ecommerce_q3_2024_no_revenue_cleaned.csv")
        .exists());
}

#[tokio::test]
async fn missing_column_is_skipped_when_already_absent() {
    let dir = TempDir::new().unwrap();
    let (config, harness) = harness(&dir);
    write_sample(&config);

    let outcome = harness
        .run_scenario(&Scenario::MissingColumn("profit".to_string()))
        .await;
    assert!(outcome.is_skipped());
}

#[tokio::test]
async fn scenarios_skip_without_dataset() {
    let dir = TempDir::new().unwrap();
    let (config, harness) = harness(&dir);

    for scenario in [Scenario::MissingDataset, Scenario::LargeDataset] {
        let outcome = harness.run_scenario(&scenario).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::PreconditionSkip));
    }
    // Skipped scenarios leave no record behind
    assert!(!config.paths.metrics_log().exists());
}

#[tokio::test]
async fn full_battery_and_summary() {
    let dir = TempDir::new().unwrap();
    let (config, harness) = harness(&dir);
    write_sample(&config);

    let reports = harness.run_all().await;
    assert_eq!(reports.len(), 4);
    assert!(matches!(reports[3].outcome, ScenarioOutcome::Skipped { .. }));

    let summary = harness.summary().await.unwrap().unwrap();
    assert_eq!(summary.total_runs, 3);
    assert_eq!(summary.by_tag.len(), 3);
    assert_eq!(summary.by_tag["baseline"].runs, 1);
    assert_eq!(summary.recent.len(), 3);
    assert_eq!(summary.recent[0].run_tag, "baseline");

    let text = summary.to_string();
    assert!(text.contains("EVALUATION SUMMARY"));
    assert!(text.contains("missing_dataset"));
}
