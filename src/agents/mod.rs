//! Agent roles
//!
//! Each pipeline stage is narrated by one role. Tools produce the numbers; a [`Narrator`]
//! turns the stage's instructions plus the upstream contracts into the stage's text.
//!
//! - **LlmNarrator**: asks an OpenRouter model, one chat completion per stage
//! - **OfflineNarrator**: deterministic text built from the same inputs, used when no API
//!   key is configured and in tests

pub mod offline;
pub mod remote;
pub mod roles;

pub use offline::OfflineNarrator;
pub use remote::LlmNarrator;
pub use roles::{Role, RoleProfile};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::types::AppResult;

/// Everything a role needs to write one stage
#[derive(Debug, Clone)]
pub struct StageBrief {
    pub stage: String,
    pub role: Role,
    pub instructions: String,
    /// Upstream contracts, caveats and earlier stage text
    pub context: String,
}

#[async_trait]
pub trait Narrator: Send + Sync {
    /// Produce the stage's text. An `Err` is a hard failure of the stage.
    async fn narrate(&self, brief: &StageBrief) -> AppResult<String>;
}

/// Pick the narrator for this configuration: the model when a key is set, offline otherwise
pub fn narrator_for(config: &Config) -> AppResult<Arc<dyn Narrator>> {
    match config.llm.active_api_key() {
        Some(api_key) => {
            info!(model = %config.llm.model, "Using OpenRouter narrator");
            Ok(Arc::new(LlmNarrator::openrouter(&api_key, &config.llm)?))
        }
        None => {
            info!("No LLM API key configured, using offline narrator");
            Ok(Arc::new(OfflineNarrator))
        }
    }
}
