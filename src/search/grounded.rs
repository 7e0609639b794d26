//! Gemini with Google Search grounding
//!
//! The model answers the query from live search results; the answer becomes
//! the findings text and the grounding metadata becomes the evidence.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{SearchError, SearchOutcome, WebSearch};
use crate::config::Config;
use crate::llm::{LLMProviderConfig, LLM};
use crate::review::SearchQuery;
use crate::types::{AppError, LLMMessage, LLMRequest};
use crate::utils::with_retry;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_secs(2);

const SEARCH_INSTRUCTION: &str = "You are a market research assistant. Search the web and \
report concrete, verifiable facts (figures, dates, names) relevant to the query. \
Be concise and do not speculate beyond what the sources say.";

pub struct GroundedSearch {
    llm: LLM,
    model: String,
    retry_delay: Duration,
}

impl GroundedSearch {
    pub fn new(api_key: &str, model: &str, base_url: Option<String>) -> Result<Self, SearchError> {
        if api_key.is_empty() {
            return Err(SearchError::NoApiKey);
        }
        let llm = LLM::new(LLMProviderConfig::new("google", api_key).with_base_url(base_url))
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;
        Ok(Self {
            llm,
            model: model.to_string(),
            retry_delay: INITIAL_DELAY,
        })
    }

    pub fn from_config(config: &Config) -> Option<Self> {
        Self::new(&config.llm.google_api_key, &config.llm.search_model, None).ok()
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn build_request(&self, query: &SearchQuery) -> LLMRequest {
        let mut prompt = query.search_query.clone();
        if !query.research_phase.is_empty() {
            prompt.push_str(&format!("\n\nResearch focus: {}", query.research_phase));
        }
        if let Some(target) = &query.target_entity {
            prompt.push_str(&format!("\nSubject: {}", target));
        }

        LLMRequest {
            provider: "google".to_string(),
            model: self.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: None,
            temperature: Some(0.2),
            system_instruction: Some(SEARCH_INSTRUCTION.to_string()),
            web_search: true,
        }
    }
}

#[async_trait]
impl WebSearch for GroundedSearch {
    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, SearchError> {
        info!(query = %query.search_query, phase = %query.research_phase, "Grounded web search");
        let request = self.build_request(query);

        let response = with_retry(
            || self.llm.create_chat_completion(&request),
            MAX_ATTEMPTS,
            self.retry_delay,
            AppError::is_transient,
        )
        .await
        .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        debug!(
            records = response.grounding.len(),
            tokens = response.usage.total_tokens,
            "Grounded search completed"
        );

        if response.content.trim().is_empty() && response.grounding.is_empty() {
            return Err(SearchError::NoResults);
        }

        Ok(SearchOutcome {
            summary: response.content,
            grounding: response.grounding,
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
