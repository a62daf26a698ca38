use async_trait::async_trait;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            "openrouter" => Box::new(crate::llm::openrouter::OpenRouterAdapter::new(&provider.api_key)),
            other => {
                return Err(AppError::Config(format!("Unsupported provider: {}", other)));
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    /// Wrap an existing adapter (used to plug in test doubles)
    pub fn with_adapter(name: impl Into<String>, adapter: Box<dyn LLMAdapter>) -> Self {
        Self {
            adapter,
            provider_name: name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_config_error() {
        let result = LLM::new(LLMProviderConfig {
            name: "carrier-pigeon".to_string(),
            api_key: "k".to_string(),
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_openrouter_provider() {
        let llm = LLM::new(LLMProviderConfig {
            name: "openrouter".to_string(),
            api_key: "k".to_string(),
        })
        .unwrap();
        assert_eq!(llm.provider_name(), "openrouter");
    }
}
