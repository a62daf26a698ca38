//! Analysis pipeline
//!
//! A fixed graph of eight stages (plan, load, clean, explore, analyze, detect anomalies,
//! visualize, report). Each stage runs its tools, hands the contracts to its role's
//! narrator, and passes both downstream. Error-shaped contracts never stop a run; only a
//! stage that produces nothing at all does.

pub mod executor;
pub mod graph;
pub mod stage;

pub use executor::{PipelineExecutor, ERROR_MARKER};
pub use graph::StageGraph;
pub use stage::{standard_stages, Stage, StageKind, StageOutput, ToolResult, Upstream};
