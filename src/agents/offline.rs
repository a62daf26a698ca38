use async_trait::async_trait;

use super::{Narrator, Role, StageBrief};
use crate::types::AppResult;

/// Deterministic narrator used without an API key. It restates the stage objective and
/// passes the upstream context through, so the report still carries every tool result.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNarrator;

#[async_trait]
impl Narrator for OfflineNarrator {
    async fn narrate(&self, brief: &StageBrief) -> AppResult<String> {
        Ok(Self::render(brief))
    }
}

impl OfflineNarrator {
    pub fn render(brief: &StageBrief) -> String {
        let objective = brief
            .instructions
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("No instructions given.");

        let heading = match brief.role {
            Role::BusinessAnalyst => "EXECUTIVE REPORT".to_string(),
            role => format!("{} | {}", role, brief.stage),
        };

        let mut out = format!("{}\nObjective: {}\n", heading, objective);
        let context = brief.context.trim();
        if context.is_empty() {
            out.push_str("No upstream results were available for this stage.\n");
        } else {
            out.push('\n');
            out.push_str(context);
            out.push('\n');
        }
        out
    }
}
