//! Tool adapters
//!
//! Thin wrappers around dataset operations. Each adapter returns a
//! [`Contract`](crate::contract::Contract) and never an `Err`: unreadable files, missing
//! columns and write failures all surface as error-shaped contracts.

pub mod analyzer;
pub mod chart;
pub mod insight;
pub mod loader;
pub mod stats;
pub mod table;

pub use analyzer::{analyze_statistics, detect_anomalies, profile_dataset, DEFAULT_Z_THRESHOLD};
pub use chart::create_chart;
pub use insight::{generate_insights, render_insights};
pub use loader::{clean_data, cleaned_path, load_dataset};
pub use table::Table;

/// Capabilities a stage may be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Loader,
    Cleaner,
    Analyzer,
    Profiler,
    AnomalyDetector,
    ChartCreator,
    InsightGenerator,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolKind::Loader => write!(f, "CSV Data Loader"),
            ToolKind::Cleaner => write!(f, "Data Cleaner"),
            ToolKind::Analyzer => write!(f, "Statistical Analyzer"),
            ToolKind::Profiler => write!(f, "Dataset Profiler"),
            ToolKind::AnomalyDetector => write!(f, "Anomaly Detector"),
            ToolKind::ChartCreator => write!(f, "Chart Creator"),
            ToolKind::InsightGenerator => write!(f, "Smart Insight Generator"),
        }
    }
}
