// Type definitions and enums

use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by the pipeline, the metrics log and the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A tool adapter produced an error-shaped contract. Never fatal to a run.
    ContractError,
    /// A stage could not produce anything at all; the run is marked failed.
    ExecutionFailure,
    /// A log or report file could not be read or written.
    IoFailure,
    /// A scenario precondition was not met; the scenario is skipped.
    PreconditionSkip,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ContractError => write!(f, "contract_error"),
            ErrorKind::ExecutionFailure => write!(f, "execution_failure"),
            ErrorKind::IoFailure => write!(f, "io_failure"),
            ErrorKind::PreconditionSkip => write!(f, "precondition_skip"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Metrics log line {line} could not be parsed: {message}")]
    LogParse { line: usize, message: String },

    #[error("Invalid stage graph: {0}")]
    StageGraph(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage '{stage}' failed: {message}")]
    Execution { stage: String, message: String },
}

impl AppError {
    /// Where this error sits in the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Io(_) | AppError::LogParse { .. } => ErrorKind::IoFailure,
            AppError::Json(_) | AppError::Csv(_) => ErrorKind::ContractError,
            AppError::LLMApi(_)
            | AppError::StageGraph(_)
            | AppError::Config(_)
            | AppError::Execution { .. } => ErrorKind::ExecutionFailure,
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
