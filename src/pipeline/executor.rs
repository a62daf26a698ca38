use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use super::graph::StageGraph;
use super::stage::{standard_stages, Stage, StageKind, StageOutput, ToolResult, TEXT_FIELD};
use crate::agents::{narrator_for, Narrator, StageBrief};
use crate::config::Config;
use crate::contract::{AnalysisPayload, ChartType, Contract};
use crate::feedback;
use crate::metrics::{MetricsRecorder, RunOutcome};
use crate::tools::{
    analyze_statistics, clean_data, create_chart, detect_anomalies, load_dataset,
    profile_dataset, render_insights, DEFAULT_Z_THRESHOLD,
};
use crate::types::{AppError, AppResult};

/// Prefix of the report text written when a run fails
pub const ERROR_MARKER: &str = "ERROR DURING RUN. ";

const MARKETING_COLUMN: &str = "marketing_spend";

pub struct PipelineExecutor {
    config: Config,
    narrator: Arc<dyn Narrator>,
    recorder: MetricsRecorder,
}

impl PipelineExecutor {
    pub fn new(config: Config, narrator: Arc<dyn Narrator>) -> Self {
        let recorder = MetricsRecorder::new(config.paths.metrics_log());
        Self {
            config,
            narrator,
            recorder,
        }
    }

    /// Executor with the narrator the configuration selects
    pub fn from_config(config: Config) -> AppResult<Self> {
        let narrator = narrator_for(&config)?;
        Ok(Self::new(config, narrator))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn recorder(&self) -> &MetricsRecorder {
        &self.recorder
    }

    /// Summarize the metrics log, then run against `dataset` or the configured default
    pub async fn run_with_feedback(
        &self,
        run_tag: &str,
        dataset: Option<&Path>,
    ) -> AppResult<RunOutcome> {
        let dataset = dataset
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.paths.raw_dataset());
        let feedback_context =
            feedback::summarize(self.recorder.log_path(), self.config.eval.feedback_window).await;
        self.run(run_tag, &dataset, &feedback_context).await
    }

    /// Execute every stage once, write one report and append one metrics record.
    ///
    /// Stage failures are folded into the returned outcome. `Err` means the report itself
    /// could not be written; a failed record is still appended in that case.
    pub async fn run(
        &self,
        run_tag: &str,
        dataset: &Path,
        feedback_context: &str,
    ) -> AppResult<RunOutcome> {
        info!(run_tag = %run_tag, dataset = %dataset.display(), "Starting pipeline run");
        let start = Utc::now();

        let mut outputs = Vec::new();
        let result = self.execute(dataset, feedback_context, &mut outputs).await;
        let end = Utc::now();

        let report_text = match &result {
            Ok(report) => report.clone(),
            Err(e) => {
                error!(run_tag = %run_tag, error = %e, "Pipeline run failed");
                failure_report(e, &outputs)
            }
        };

        let report_path = match write_report(&self.config.paths.reports_dir(), end, &report_text).await
        {
            Ok(path) => path,
            Err(e) => {
                error!(run_tag = %run_tag, error = %e, "Failed to write report");
                let outcome = RunOutcome::failed(run_tag, start, end, Path::new(""), &e);
                self.record(&outcome).await;
                return Err(e);
            }
        };

        let outcome = match result {
            Ok(_) => RunOutcome::succeeded(
                run_tag,
                start,
                end,
                &report_path,
                contract_error_stages(&outputs),
            ),
            Err(e) => RunOutcome::failed(run_tag, start, end, &report_path, &e),
        };
        self.record(&outcome).await;

        info!(
            run_tag = %run_tag,
            success = outcome.success,
            duration_secs = outcome.duration_seconds,
            report = %report_path.display(),
            "Pipeline run finished"
        );
        Ok(outcome)
    }

    async fn record(&self, outcome: &RunOutcome) {
        if let Err(e) = self.recorder.append(outcome).await {
            error!(run_tag = %outcome.run_tag, error = %e, "Failed to append run metrics");
        }
    }

    async fn execute(
        &self,
        dataset: &Path,
        feedback_context: &str,
        outputs: &mut Vec<StageOutput>,
    ) -> AppResult<String> {
        let target = self.config.paths.target_column.as_str();
        let graph = StageGraph::new(standard_stages(dataset, feedback_context, target))?;

        for stage in graph.ordered() {
            let started = Instant::now();
            let results = self.invoke_tools(stage, dataset, outputs)?;
            for message in results.iter().filter_map(ToolResult::error_message) {
                warn!(stage = %stage.kind, message = %message, "Tool returned an error contract");
            }

            let brief = StageBrief {
                stage: stage.name().to_string(),
                role: stage.kind.role(),
                instructions: stage.instructions.clone(),
                context: stage_context(stage, outputs, &results),
            };
            let text = self.narrator.narrate(&brief).await.map_err(|e| match e {
                AppError::Execution { .. } => e,
                other => AppError::Execution {
                    stage: stage.name().to_string(),
                    message: other.to_string(),
                },
            })?;

            info!(
                stage = %stage.kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage finished"
            );
            outputs.push(StageOutput {
                kind: stage.kind,
                text,
                results,
            });
        }

        Ok(compose_report(outputs))
    }

    /// Run the stage's tools, converting a panic inside a tool into a stage failure
    fn invoke_tools(
        &self,
        stage: &Stage,
        dataset: &Path,
        outputs: &[StageOutput],
    ) -> AppResult<Vec<ToolResult>> {
        let results = catch_unwind(AssertUnwindSafe(|| self.call_tools(stage.kind, dataset, outputs)))
            .map_err(|payload| AppError::Execution {
                stage: stage.name().to_string(),
                message: format!("tool panicked: {}", panic_message(payload.as_ref())),
            })?;

        if let Some(denied) = results.iter().find(|r| !stage.may_use(r.tool())) {
            return Err(AppError::Execution {
                stage: stage.name().to_string(),
                message: format!("stage is not permitted to use the {}", denied.tool()),
            });
        }
        Ok(results)
    }

    fn call_tools(&self, kind: StageKind, dataset: &Path, outputs: &[StageOutput]) -> Vec<ToolResult> {
        let target = self.config.paths.target_column.as_str();
        let working = working_dataset(outputs, dataset);

        match kind {
            StageKind::Plan => vec![],
            StageKind::Load => vec![ToolResult::Load(load_dataset(dataset))],
            StageKind::Clean => {
                let input = output_of(outputs, StageKind::Load)
                    .and_then(StageOutput::load)
                    .and_then(Contract::payload)
                    .map(|p| PathBuf::from(&p.path))
                    .unwrap_or_else(|| dataset.to_path_buf());
                vec![ToolResult::Clean(clean_data(&input))]
            }
            StageKind::Explore => vec![ToolResult::Profile(profile_dataset(&working, target))],
            StageKind::Analyze => vec![ToolResult::Analysis(analyze_statistics(&working, target))],
            StageKind::DetectAnomalies => vec![ToolResult::Anomaly(detect_anomalies(
                &working,
                target,
                DEFAULT_Z_THRESHOLD,
            ))],
            StageKind::Visualize => {
                let charts_dir = self.config.paths.charts_dir();
                let mut charts = vec![
                    ToolResult::Chart(create_chart(&working, ChartType::Line, "date", target, &charts_dir)),
                    ToolResult::Chart(create_chart(&working, ChartType::Bar, "category", target, &charts_dir)),
                ];
                let has_marketing = output_of(outputs, StageKind::Load)
                    .and_then(StageOutput::load)
                    .and_then(Contract::payload)
                    .map(|p| p.columns.iter().any(|c| c == MARKETING_COLUMN))
                    .unwrap_or(false);
                if has_marketing {
                    charts.push(ToolResult::Chart(create_chart(
                        &working,
                        ChartType::Scatter,
                        MARKETING_COLUMN,
                        target,
                        &charts_dir,
                    )));
                }
                charts
            }
            StageKind::Report => {
                let missing: Contract<AnalysisPayload> =
                    Contract::error("No statistical analysis was produced for this run.");
                let analysis = output_of(outputs, StageKind::Analyze)
                    .and_then(StageOutput::analysis)
                    .unwrap_or(&missing);
                vec![ToolResult::Insight(render_insights(analysis, Local::now()))]
            }
        }
    }
}

fn output_of(outputs: &[StageOutput], kind: StageKind) -> Option<&StageOutput> {
    outputs.iter().find(|o| o.kind == kind)
}

/// Cleaned file if cleaning succeeded, then the loaded file, then the raw dataset
fn working_dataset(outputs: &[StageOutput], dataset: &Path) -> PathBuf {
    let cleaned = output_of(outputs, StageKind::Clean)
        .and_then(StageOutput::clean)
        .and_then(Contract::payload)
        .map(|p| PathBuf::from(&p.clean_path));
    let loaded = output_of(outputs, StageKind::Load)
        .and_then(StageOutput::load)
        .and_then(Contract::payload)
        .map(|p| PathBuf::from(&p.path));
    cleaned
        .or(loaded)
        .unwrap_or_else(|| dataset.to_path_buf())
}

/// Caveats for failed upstream contracts, the consumed upstream fields, then this stage's
/// own tool results
fn stage_context(stage: &Stage, outputs: &[StageOutput], results: &[ToolResult]) -> String {
    let mut caveats = Vec::new();
    let mut sections = Vec::new();

    for upstream in &stage.upstream {
        let Some(output) = output_of(outputs, upstream.stage) else {
            continue;
        };
        for message in output.contract_errors() {
            caveats.push(format!(
                "Caveat: upstream stage '{}' reported an error: {}. Continue with fallback defaults and say so.",
                upstream.stage, message
            ));
        }

        let mut section = format!("[{}]", upstream.stage);
        if upstream.fields.contains(&TEXT_FIELD) && !output.text.trim().is_empty() {
            section.push('\n');
            section.push_str(output.text.trim());
        }
        let fields: Vec<&str> = upstream
            .fields
            .iter()
            .copied()
            .filter(|f| *f != TEXT_FIELD)
            .collect();
        if !fields.is_empty() {
            for projected in output.results.iter().filter_map(|r| r.project(&fields)) {
                section.push('\n');
                section.push_str(&projected);
            }
        }
        sections.push(section);
    }

    if !results.is_empty() {
        let own: Vec<String> = results
            .iter()
            .map(|r| match r {
                ToolResult::Insight(text) => text.trim().to_string(),
                other => format!("{}: {}", other.tool(), other.to_json()),
            })
            .collect();
        sections.push(format!("Tool results:\n{}", own.join("\n")));
    }

    caveats
        .into_iter()
        .chain(sections)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The report stage's text followed by the insight block, unless the text already has it
fn compose_report(outputs: &[StageOutput]) -> String {
    let Some(report) = output_of(outputs, StageKind::Report) else {
        return String::new();
    };
    let mut text = report.text.trim_end().to_string();
    for result in &report.results {
        if let ToolResult::Insight(insight) = result {
            if !text.contains(insight.trim()) {
                text.push_str("\n\n");
                text.push_str(insight.trim());
            }
        }
    }
    text.push('\n');
    text
}

fn failure_report(error: &AppError, outputs: &[StageOutput]) -> String {
    let mut text = format!("{}{}\n", ERROR_MARKER, error);
    if !outputs.is_empty() {
        text.push_str("\nPartial results before the failure:\n");
        for output in outputs {
            text.push_str(&format!("\n[{}]\n{}\n", output.kind, output.text.trim()));
        }
    }
    text
}

fn contract_error_stages(outputs: &[StageOutput]) -> Vec<String> {
    outputs
        .iter()
        .filter(|o| !o.contract_errors().is_empty())
        .map(|o| o.kind.to_string())
        .collect()
}

/// Write `report_<timestamp>.txt`, adding a counter if that name is already taken
async fn write_report(dir: &Path, at: DateTime<Utc>, text: &str) -> AppResult<PathBuf> {
    fs::create_dir_all(dir).await?;
    let stamp = at.with_timezone(&Local).format("%Y%m%d_%H%M%S_%3f").to_string();

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("report_{}.txt", stamp)
        } else {
            format!("report_{}_{}.txt", stamp, attempt)
        };
        let path = dir.join(name);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(text.as_bytes()).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
