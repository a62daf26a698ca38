use async_trait::async_trait;
use tracing::{debug, error};

use super::{Narrator, StageBrief};
use crate::config::LLMConfig;
use crate::llm::provider::{LLMProviderConfig, LLM};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

pub struct LlmNarrator {
    llm: LLM,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmNarrator {
    pub fn openrouter(api_key: &str, config: &LLMConfig) -> AppResult<Self> {
        let llm = LLM::new(LLMProviderConfig {
            name: "openrouter".to_string(),
            api_key: api_key.to_string(),
        })?;
        Ok(Self::new(llm, config))
    }

    pub fn new(llm: LLM, config: &LLMConfig) -> Self {
        Self {
            llm,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn build_request(&self, brief: &StageBrief) -> LLMRequest {
        let mut prompt = brief.instructions.clone();
        if !brief.context.trim().is_empty() {
            prompt.push_str("\n\nContext from earlier stages:\n");
            prompt.push_str(&brief.context);
        }
        LLMRequest {
            model: self.model.clone(),
            messages: vec![
                LLMMessage::system(brief.role.system_prompt()),
                LLMMessage::user(prompt),
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        }
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn narrate(&self, brief: &StageBrief) -> AppResult<String> {
        let request = self.build_request(brief);
        debug!(stage = %brief.stage, role = %brief.role, "Requesting stage narration");

        let response = self.llm.create_chat_completion(&request).await.map_err(|e| {
            error!(stage = %brief.stage, error = %e, "LLM call failed");
            e
        })?;

        if response.content.trim().is_empty() {
            return Err(AppError::Execution {
                stage: brief.stage.clone(),
                message: "Invalid response from LLM call - None or empty.".to_string(),
            });
        }
        Ok(response.content)
    }
}
