use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use sales_analyst::agents::{Narrator, OfflineNarrator, StageBrief};
use sales_analyst::contract::{AnalysisPayload, Contract, TrendDirection};
use sales_analyst::feedback::{self, FIRST_RUN_MESSAGE};
use sales_analyst::metrics::load_all;
use sales_analyst::pipeline::ERROR_MARKER;
use sales_analyst::tools::analyze_statistics;
use sales_analyst::{AppError, AppResult, Config, PipelineExecutor};

/// Records every brief it sees so tests can inspect what each stage was told
#[derive(Default)]
struct RecordingNarrator {
    briefs: std::sync::Mutex<Vec<StageBrief>>,
}

#[async_trait]
impl Narrator for RecordingNarrator {
    async fn narrate(&self, brief: &StageBrief) -> AppResult<String> {
        self.briefs.lock().unwrap().push(brief.clone());
        Ok(OfflineNarrator::render(brief))
    }
}

struct BrokenNarrator;

#[async_trait]
impl Narrator for BrokenNarrator {
    async fn narrate(&self, _brief: &StageBrief) -> AppResult<String> {
        Err(AppError::LLMApi("connection refused".to_string()))
    }
}

fn declining_dataset(config: &Config, rows: usize) -> PathBuf {
    std::fs::create_dir_all(&config.paths.data_dir).unwrap();
    let path = config.paths.raw_dataset();
    let mut csv = String::from("date,category,revenue,orders,marketing_spend\n");
    for i in 0..rows {
        let category = ["Electronics", "Clothing"][i % 2];
        // Flat for two thirds of the rows, then a steady decline
        let decline = i.saturating_sub(rows * 2 / 3) as f64 * 400.0;
        let revenue = 50_000.0 - decline + (i % 3) as f64 * 15.0;
        csv.push_str(&format!(
            "2024-{:02}-{:02},{},{},{},{}\n",
            7 + i / 31 % 3,
            i % 28 + 1,
            category,
            revenue,
            100 + i,
            revenue * 0.1
        ));
    }
    std::fs::write(&path, csv).unwrap();
    path
}

#[test]
fn declining_revenue_is_detected() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    let dataset = declining_dataset(&config, 100);

    let contract: Contract<AnalysisPayload> = analyze_statistics(&dataset, "revenue");
    let payload = contract.payload().unwrap();
    assert_eq!(payload.trend.direction, TrendDirection::Decreasing);
    assert!(payload.trend.slope < 0.0);
}

#[tokio::test]
async fn declining_trend_reaches_the_report() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    let dataset = declining_dataset(&config, 100);
    let narrator = Arc::new(RecordingNarrator::default());
    let executor = PipelineExecutor::new(config, narrator.clone());

    let outcome = executor.run("declining", &dataset, "").await.unwrap();
    assert!(outcome.success);

    let briefs = narrator.briefs.lock().unwrap();
    let report_brief = briefs.iter().find(|b| b.stage == "report").unwrap();
    assert!(report_brief.context.contains("\"direction\":\"decreasing\""));

    let report = std::fs::read_to_string(&outcome.report_file).unwrap();
    assert!(report.contains("Revenue trend is decreasing"));
}

#[test]
fn single_row_dataset_is_stable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("one.csv");
    std::fs::write(&path, "date,revenue\n2024-07-01,10\n").unwrap();

    let contract = analyze_statistics(&path, "revenue");
    assert_eq!(contract.payload().unwrap().trend.direction, TrendDirection::Stable);
}

#[tokio::test]
async fn second_run_sees_first_run_in_feedback() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    declining_dataset(&config, 60);
    let narrator = Arc::new(RecordingNarrator::default());
    let executor = PipelineExecutor::new(config.clone(), narrator.clone());

    executor.run_with_feedback("first", None).await.unwrap();
    executor.run_with_feedback("second", None).await.unwrap();

    let briefs = narrator.briefs.lock().unwrap();
    let plans: Vec<&StageBrief> = briefs.iter().filter(|b| b.stage == "plan").collect();
    assert_eq!(plans.len(), 2);
    assert!(plans[0].instructions.contains(FIRST_RUN_MESSAGE));
    assert!(!plans[1].instructions.contains(FIRST_RUN_MESSAGE));
    assert!(plans[1]
        .instructions
        .contains("Recent runs analyzed. 1 total, success rate 1.00."));
}

#[tokio::test]
async fn every_stage_runs_once_in_order() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    let dataset = declining_dataset(&config, 40);
    let narrator = Arc::new(RecordingNarrator::default());
    let executor = PipelineExecutor::new(config, narrator.clone());

    executor.run("ordered", &dataset, "").await.unwrap();

    let stages: Vec<String> = narrator
        .briefs
        .lock()
        .unwrap()
        .iter()
        .map(|b| b.stage.clone())
        .collect();
    assert_eq!(
        stages,
        vec!["plan", "load", "clean", "explore", "analyze", "detect_anomalies", "visualize", "report"]
    );
}

#[tokio::test]
async fn hard_failure_still_writes_report_and_record() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    let dataset = declining_dataset(&config, 20);
    let executor = PipelineExecutor::new(config.clone(), Arc::new(BrokenNarrator));

    let outcome = executor.run("broken", &dataset, "").await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.error_message.as_deref().unwrap().contains("connection refused"));

    let report = std::fs::read_to_string(&outcome.report_file).unwrap();
    assert!(report.starts_with(ERROR_MARKER));

    let records = load_all(&config.paths.metrics_log()).await.unwrap().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);

    // The failure shows up in the next run's feedback
    let text = feedback::summarize(&config.paths.metrics_log(), 5).await;
    assert!(text.contains("Common recent errors."));
    assert!(text.contains("connection refused"));
}

#[tokio::test]
async fn metrics_log_is_append_only() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    let dataset = declining_dataset(&config, 30);
    let executor = PipelineExecutor::new(config.clone(), Arc::new(OfflineNarrator));
    let log = config.paths.metrics_log();

    let mut previous = String::new();
    for tag in ["a", "b", "c"] {
        executor.run(tag, &dataset, "").await.unwrap();
        let current = std::fs::read_to_string(&log).unwrap();
        assert!(current.starts_with(&previous));
        assert_eq!(current.lines().count(), previous.lines().count() + 1);
        previous = current;
    }

    let records = load_all(&log).await.unwrap().unwrap();
    for record in &records {
        let elapsed = (record.end_time - record.start_time).num_microseconds().unwrap();
        assert!((record.duration_seconds - elapsed as f64 / 1e6).abs() < 1e-6);
        assert!(Path::new(&record.report_file).is_file());
    }
}

#[tokio::test]
async fn missing_target_column_degrades_gracefully() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_root(dir.path());
    std::fs::create_dir_all(&config.paths.data_dir).unwrap();
    let path = config.paths.data_dir.join("no_revenue.csv");
    std::fs::write(&path, "date,category,orders\n2024-07-01,Clothing,3\n2024-07-02,Clothing,4\n")
        .unwrap();
    let narrator = Arc::new(RecordingNarrator::default());
    let executor = PipelineExecutor::new(config, narrator.clone());

    let outcome = executor.run("missing_revenue", &path, "").await.unwrap();
    assert!(outcome.success);
    assert!(outcome.contract_errors.contains(&"analyze".to_string()));

    let briefs = narrator.briefs.lock().unwrap();
    let anomalies = briefs.iter().find(|b| b.stage == "detect_anomalies").unwrap();
    assert!(anomalies
        .context
        .contains("Caveat: upstream stage 'analyze' reported an error: Target column 'revenue' not found"));

    let report = std::fs::read_to_string(&outcome.report_file).unwrap();
    assert!(report.contains("Confidence: 40 percent"));
}
