//! Stage Contracts
//!
//! Every tool adapter returns a [`Contract`]: either the payload for its stage kind or an
//! error message. On the wire a contract is a flat JSON object tagged by `status`:
//!
//! ```text
//! {"status":"ok","path":"data/x.csv","rows":372,"columns":["date","revenue"]}
//! {"status":"error","message":"Target column 'revenue' not found in dataset."}
//! ```
//!
//! Consumers parse defensively with [`Contract::parse`], which never fails, and ignore
//! fields they do not know about.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Contract<T> {
    Ok(T),
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        available_columns: Vec<String>,
    },
}

impl<T> Contract<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Contract::Error {
            message: message.into(),
            available_columns: Vec::new(),
        }
    }

    pub fn error_with_columns(message: impl Into<String>, columns: Vec<String>) -> Self {
        Contract::Error {
            message: message.into(),
            available_columns: columns,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Contract::Ok(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Contract::Ok(payload) => Some(payload),
            Contract::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Contract::Ok(_) => None,
            Contract::Error { message, .. } => Some(message),
        }
    }
}

impl<T: DeserializeOwned> Contract<T> {
    /// Parse tool output. Anything that is not a well-formed contract becomes an error contract.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text)
            .unwrap_or_else(|e| Contract::error(format!("Malformed tool result: {}", e)))
    }
}

impl<T: Serialize> Contract<T> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"status\":\"error\",\"message\":{}}}",
                serde_json::Value::String(format!("Unserializable tool result: {}", e))
            )
        })
    }
}

/// CSV Data Loader output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPayload {
    pub path: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Data Cleaner output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanPayload {
    pub original_rows: usize,
    pub clean_rows: usize,
    pub clean_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if !slope.is_finite() || slope == 0.0 {
            TrendDirection::Stable
        } else if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub slope: f64,
    pub r2: f64,
    pub p_value: f64,
    pub direction: TrendDirection,
}

impl Trend {
    /// Trend reported when there are too few observations to fit a line
    pub fn flat() -> Self {
        Self {
            slope: 0.0,
            r2: 0.0,
            p_value: 1.0,
            direction: TrendDirection::Stable,
        }
    }
}

/// Statistical Analyzer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub target: String,
    pub mean: f64,
    pub std: f64,
    pub trend: Trend,
    #[serde(default)]
    pub correlations: BTreeMap<String, f64>,
    /// Mean target per category, when the dataset has a category column
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub segments: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Scatter,
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartType::Line => write!(f, "line"),
            ChartType::Bar => write!(f, "bar"),
            ChartType::Scatter => write!(f, "scatter"),
        }
    }
}

/// Chart Creator output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub chart_type: ChartType,
    pub x: String,
    pub y: String,
    pub path: String,
}

/// Dataset profile used by the exploratory stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub target: String,
    pub rows: usize,
    #[serde(default)]
    pub by_month: BTreeMap<String, f64>,
    #[serde(default)]
    pub by_category: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    /// Zero-based data row (header excluded)
    pub row: usize,
    pub value: f64,
    pub z_score: f64,
}

/// Anomaly detector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPayload {
    pub target: String,
    pub z_threshold: f64,
    pub mean: f64,
    pub std: f64,
    pub total_outliers: usize,
    #[serde(default)]
    pub outliers: Vec<Outlier>,
}
