// Sales Analyst - staged, self-evaluating analysis pipeline for tabular sales data

pub mod agents;
pub mod config;
pub mod contract;
pub mod datagen;
pub mod evaluation;
pub mod feedback;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod tools;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use contract::Contract;
pub use evaluation::{EvaluationHarness, EvaluationSummary};
pub use metrics::{MetricsRecorder, RunOutcome};
pub use pipeline::PipelineExecutor;
pub use types::{AppError, AppResult, ErrorKind};
