use std::path::Path;

use serde_json::Value;

use crate::agents::Role;
use crate::contract::{
    AnalysisPayload, AnomalyPayload, ChartPayload, CleanPayload, Contract, LoadPayload,
    ProfilePayload,
};
use crate::tools::ToolKind;

/// Pseudo-field naming an upstream stage's narrative rather than a contract field
pub const TEXT_FIELD: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Plan,
    Load,
    Clean,
    Explore,
    Analyze,
    DetectAnomalies,
    Visualize,
    Report,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Plan => "plan",
            StageKind::Load => "load",
            StageKind::Clean => "clean",
            StageKind::Explore => "explore",
            StageKind::Analyze => "analyze",
            StageKind::DetectAnomalies => "detect_anomalies",
            StageKind::Visualize => "visualize",
            StageKind::Report => "report",
        }
    }

    pub fn role(&self) -> Role {
        match self {
            StageKind::Plan => Role::Controller,
            StageKind::Load => Role::DataLoader,
            StageKind::Clean => Role::DataQualityEngineer,
            StageKind::Explore => Role::ExploratoryAnalyst,
            StageKind::Analyze => Role::Statistician,
            StageKind::DetectAnomalies => Role::AnomalySpecialist,
            StageKind::Visualize => Role::VisualizationDesigner,
            StageKind::Report => Role::BusinessAnalyst,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One dependency edge: which upstream stage and which of its fields are read
#[derive(Debug, Clone)]
pub struct Upstream {
    pub stage: StageKind,
    pub fields: Vec<&'static str>,
}

impl Upstream {
    pub fn new(stage: StageKind, fields: &[&'static str]) -> Self {
        Self {
            stage,
            fields: fields.to_vec(),
        }
    }
}

/// A unit of work, immutable once the graph is built
#[derive(Debug, Clone)]
pub struct Stage {
    pub kind: StageKind,
    pub upstream: Vec<Upstream>,
    pub tools: Vec<ToolKind>,
    pub instructions: String,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn may_use(&self, tool: ToolKind) -> bool {
        self.tools.contains(&tool)
    }
}

/// One tool invocation's result, typed by the tool that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Load(Contract<LoadPayload>),
    Clean(Contract<CleanPayload>),
    Profile(Contract<ProfilePayload>),
    Analysis(Contract<AnalysisPayload>),
    Anomaly(Contract<AnomalyPayload>),
    Chart(Contract<ChartPayload>),
    Insight(String),
}

impl ToolResult {
    pub fn tool(&self) -> ToolKind {
        match self {
            ToolResult::Load(_) => ToolKind::Loader,
            ToolResult::Clean(_) => ToolKind::Cleaner,
            ToolResult::Profile(_) => ToolKind::Profiler,
            ToolResult::Analysis(_) => ToolKind::Analyzer,
            ToolResult::Anomaly(_) => ToolKind::AnomalyDetector,
            ToolResult::Chart(_) => ToolKind::ChartCreator,
            ToolResult::Insight(_) => ToolKind::InsightGenerator,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResult::Load(c) => c.error_message(),
            ToolResult::Clean(c) => c.error_message(),
            ToolResult::Profile(c) => c.error_message(),
            ToolResult::Analysis(c) => c.error_message(),
            ToolResult::Anomaly(c) => c.error_message(),
            ToolResult::Chart(c) => c.error_message(),
            ToolResult::Insight(_) => None,
        }
    }

    pub fn to_json(&self) -> String {
        match self {
            ToolResult::Load(c) => c.to_json(),
            ToolResult::Clean(c) => c.to_json(),
            ToolResult::Profile(c) => c.to_json(),
            ToolResult::Analysis(c) => c.to_json(),
            ToolResult::Anomaly(c) => c.to_json(),
            ToolResult::Chart(c) => c.to_json(),
            ToolResult::Insight(text) => Value::String(text.clone()).to_string(),
        }
    }

    /// Contract JSON reduced to `status`, `message` and the requested fields
    pub fn project(&self, fields: &[&str]) -> Option<String> {
        if let ToolResult::Insight(text) = self {
            return Some(text.clone());
        }
        let value: Value = serde_json::from_str(&self.to_json()).ok()?;
        let Value::Object(map) = value else {
            return None;
        };
        let projected: serde_json::Map<String, Value> = map
            .into_iter()
            .filter(|(k, _)| k == "status" || k == "message" || fields.contains(&k.as_str()))
            .collect();
        Some(Value::Object(projected).to_string())
    }
}

/// What a stage produced during one run
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub kind: StageKind,
    pub text: String,
    pub results: Vec<ToolResult>,
}

impl StageOutput {
    pub fn contract_errors(&self) -> Vec<&str> {
        self.results.iter().filter_map(|r| r.error_message()).collect()
    }

    pub fn load(&self) -> Option<&Contract<LoadPayload>> {
        self.results.iter().find_map(|r| match r {
            ToolResult::Load(c) => Some(c),
            _ => None,
        })
    }

    pub fn clean(&self) -> Option<&Contract<CleanPayload>> {
        self.results.iter().find_map(|r| match r {
            ToolResult::Clean(c) => Some(c),
            _ => None,
        })
    }

    pub fn analysis(&self) -> Option<&Contract<AnalysisPayload>> {
        self.results.iter().find_map(|r| match r {
            ToolResult::Analysis(c) => Some(c),
            _ => None,
        })
    }
}

const BUSINESS_QUESTIONS: &str = "\
1. Why did revenue drop in September?
2. Which categories underperformed?
3. What can we say about marketing spend vs revenue?
4. Are there any clear anomalies?
5. What should we do in Q4?";

/// Build the fixed stage sequence for one run. Instruction text is bound here; upstream
/// contract fields are attached as context when each stage executes.
pub fn standard_stages(dataset: &Path, feedback_context: &str, target: &str) -> Vec<Stage> {
    let dataset = dataset.display();

    vec![
        Stage {
            kind: StageKind::Plan,
            upstream: vec![],
            tools: vec![],
            instructions: format!(
                "You are the controller agent for this analysis.\n\
                 Main business questions.\n{BUSINESS_QUESTIONS}\n\
                 You also receive feedback from previous evaluation runs.\n\
                 {feedback_context}\n\n\
                 Your goals.\n\
                 1. Summarize key objectives for this run.\n\
                 2. Outline the order in which specialized agents should act and why.\n\
                 3. Highlight data quality or tooling risks that other agents should watch for.\n\
                 4. If recent runs had failures, adjust the workflow plan to reduce the same errors.\n"
            ),
        },
        Stage {
            kind: StageKind::Load,
            upstream: vec![Upstream::new(StageKind::Plan, &[TEXT_FIELD])],
            tools: vec![ToolKind::Loader],
            instructions: format!(
                "Locate and validate the dataset for this analysis.\n\
                 - The dataset is expected at '{dataset}'.\n\
                 - Report status, path, rows, and columns from the CSV Data Loader.\n\
                 - If the loader reports an error, explain what is missing.\n"
            ),
        },
        Stage {
            kind: StageKind::Clean,
            upstream: vec![Upstream::new(StageKind::Load, &["path", "rows", "columns"])],
            tools: vec![ToolKind::Cleaner],
            instructions: format!(
                "Clean the dataset.\n\
                 - Use the path returned by the load stage if available. Otherwise fall back to '{dataset}'.\n\
                 - Missing numeric values are filled with medians and duplicates removed.\n\
                 - Report original_rows, clean_rows, and clean_path.\n"
            ),
        },
        Stage {
            kind: StageKind::Explore,
            upstream: vec![Upstream::new(StageKind::Clean, &["clean_path", "clean_rows"])],
            tools: vec![ToolKind::Profiler],
            instructions: format!(
                "Run exploratory data analysis on the cleaned dataset.\n\
                 - Focus on {target} by month and category.\n\
                 - Describe high level patterns in plain language.\n\
                 - Point out any obvious shifts across July, August, and September.\n"
            ),
        },
        Stage {
            kind: StageKind::Analyze,
            upstream: vec![Upstream::new(StageKind::Clean, &["clean_path"])],
            tools: vec![ToolKind::Analyzer],
            instructions: format!(
                "Use the Statistical Analyzer on the cleaned dataset.\n\
                 - Target column should be {target}.\n\
                 - Report mean, standard deviation, and trend information.\n\
                 - Highlight any strong correlations with other numeric columns.\n"
            ),
        },
        Stage {
            kind: StageKind::DetectAnomalies,
            upstream: vec![
                Upstream::new(StageKind::Explore, &["by_month", "by_category"]),
                Upstream::new(StageKind::Analyze, &["mean", "std", "trend"]),
            ],
            tools: vec![ToolKind::AnomalyDetector],
            instructions: "Identify anomalies using the exploratory context and the statistical output.\n\
                 - Pay special attention to September compared to July and August.\n\
                 - Describe any obvious outliers or strange values.\n\
                 - Suggest possible causes in simple terms.\n"
                .to_string(),
        },
        Stage {
            kind: StageKind::Visualize,
            upstream: vec![
                Upstream::new(StageKind::Load, &["columns"]),
                Upstream::new(StageKind::Clean, &["clean_path"]),
                Upstream::new(StageKind::Analyze, &["trend", "correlations"]),
            ],
            tools: vec![ToolKind::ChartCreator],
            instructions: format!(
                "Create visualizations of the cleaned dataset.\n\
                 - {target} over time.\n\
                 - {target} by category.\n\
                 - Marketing spend vs {target} when that column exists.\n\
                 - Describe what each chart shows.\n"
            ),
        },
        Stage {
            kind: StageKind::Report,
            upstream: vec![
                Upstream::new(StageKind::Plan, &[TEXT_FIELD]),
                Upstream::new(StageKind::Explore, &[TEXT_FIELD]),
                Upstream::new(StageKind::Analyze, &[TEXT_FIELD, "trend", "correlations", "segments"]),
                Upstream::new(StageKind::DetectAnomalies, &[TEXT_FIELD, "total_outliers"]),
                Upstream::new(StageKind::Visualize, &[TEXT_FIELD, "path"]),
            ],
            tools: vec![ToolKind::InsightGenerator],
            instructions: "Write the final executive report.\n\
                 Requirements.\n\
                 1) Explain why revenue dropped in September, based on the data.\n\
                 2) List which categories underperformed.\n\
                 3) Summarize what we can say about marketing spend vs revenue.\n\
                 4) Note any clear anomalies.\n\
                 5) Give concrete, business friendly recommendations for Q4.\n\
                 - Do not mention internal tools, agent names, or system errors.\n\
                 - Write for a VP of Sales who wants clear, concise answers.\n"
                .to_string(),
        },
    ]
}
