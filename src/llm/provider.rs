use async_trait::async_trait;

use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for one LLM provider
#[derive(Debug, Clone)]
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Overrides the provider's default endpoint (OpenAI-compatible proxies, tests)
    pub base_url: Option<String>,
}

impl LLMProviderConfig {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            // Any OpenAI-compatible endpoint (OpenRouter, LiteLLM) goes through the same adapter
            "openai" | "openrouter" | "litellm" => Box::new(crate::llm::openai::OpenAIAdapter::new(
                &provider.api_key,
                provider.base_url.as_deref(),
            )),
            "google" | "gemini" => Box::new(crate::llm::google::GoogleAdapter::new(
                &provider.api_key,
                provider.base_url.as_deref(),
            )),
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "Unsupported LLM provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
