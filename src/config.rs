use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::types::{AppError, AppResult};

pub const DEFAULT_DATASET_HINT: &str = "ecommerce_q3_2024";
pub const DEFAULT_MODEL: &str = "x-ai/grok-4.1-fast:free";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub llm: LLMConfig,
    pub eval: EvalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub dataset_hint: String,
    pub outputs_dir: PathBuf,
    pub target_column: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openrouter_api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    pub feedback_window: usize,
    pub required_column: String,
}

impl LLMConfig {
    /// API key to use, if one is configured and non-empty
    pub fn active_api_key(&self) -> Option<String> {
        self.openrouter_api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

impl PathsConfig {
    /// Default dataset the pipeline analyzes when no explicit path is given
    pub fn raw_dataset(&self) -> PathBuf {
        self.data_dir.join(format!("{}.csv", self.dataset_hint))
    }

    /// Optional oversized variant used by the evaluation harness
    pub fn large_dataset(&self) -> PathBuf {
        self.data_dir.join(format!("{}_large.csv", self.dataset_hint))
    }

    pub fn metrics_log(&self) -> PathBuf {
        self.outputs_dir.join("eval").join("metrics.jsonl")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.outputs_dir.join("reports")
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.outputs_dir.join("visualizations")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.outputs_dir.join("logs")
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> AppResult<T> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", name, raw)))
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            paths: PathsConfig {
                data_dir: PathBuf::from(
                    env::var("SALES_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
                ),
                dataset_hint: env::var("SALES_DATASET_HINT")
                    .unwrap_or_else(|_| DEFAULT_DATASET_HINT.to_string()),
                outputs_dir: PathBuf::from(
                    env::var("SALES_OUTPUTS_DIR").unwrap_or_else(|_| "outputs".to_string()),
                ),
                target_column: env::var("SALES_TARGET_COLUMN")
                    .unwrap_or_else(|_| "revenue".to_string()),
            },
            llm: LLMConfig {
                openrouter_api_key: env::var("OPENROUTER_API_KEY").ok(),
                model: env::var("SALES_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                temperature: parse_var("SALES_LLM_TEMPERATURE", "0.7")?,
                max_tokens: parse_var("SALES_LLM_MAX_TOKENS", "2048")?,
            },
            eval: EvalConfig {
                feedback_window: parse_var("SALES_FEEDBACK_WINDOW", "5")?,
                required_column: env::var("SALES_REQUIRED_COLUMN")
                    .unwrap_or_else(|_| "revenue".to_string()),
            },
        })
    }

    /// Same layout as the defaults, rooted at `root`, with no API key (useful for testing)
    pub fn for_root(root: &Path) -> Self {
        Self {
            paths: PathsConfig {
                data_dir: root.join("data"),
                dataset_hint: DEFAULT_DATASET_HINT.to_string(),
                outputs_dir: root.join("outputs"),
                target_column: "revenue".to_string(),
            },
            llm: LLMConfig {
                openrouter_api_key: None,
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.7,
                max_tokens: 2048,
            },
            eval: EvalConfig {
                feedback_window: 5,
                required_column: "revenue".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = Config::for_root(Path::new("/tmp/run"));
        assert_eq!(
            config.paths.raw_dataset(),
            PathBuf::from("/tmp/run/data/ecommerce_q3_2024.csv")
        );
        assert_eq!(
            config.paths.large_dataset(),
            PathBuf::from("/tmp/run/data/ecommerce_q3_2024_large.csv")
        );
        assert_eq!(
            config.paths.metrics_log(),
            PathBuf::from("/tmp/run/outputs/eval/metrics.jsonl")
        );
    }

    #[test]
    fn test_active_api_key_ignores_blank() {
        let mut config = Config::for_root(Path::new("."));
        assert!(config.llm.active_api_key().is_none());
        config.llm.openrouter_api_key = Some("   ".to_string());
        assert!(config.llm.active_api_key().is_none());
        config.llm.openrouter_api_key = Some("sk-or-123".to_string());
        assert_eq!(config.llm.active_api_key().as_deref(), Some("sk-or-123"));
    }
}
