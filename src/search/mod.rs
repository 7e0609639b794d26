//! Search Module
//!
//! Web search used by the research steps. Every backend reports what it found
//! as [`GroundingRecord`]s so the run's source ledger can ingest them:
//! - Gemini with Google Search grounding (default)
//! - SerpAPI Google Light (snippets become the supported claims)

pub mod grounded;
pub mod serpapi;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::review::SearchQuery;
use crate::types::GroundingRecord;

pub use grounded::GroundedSearch;
pub use serpapi::{LightResult, SerpApiClient};

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search API key not configured")]
    NoApiKey,

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),

    #[error("No results found for query")]
    NoResults,
}

/// What one query turned up
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    /// Prose summary of the results, as the backend wrote it
    pub summary: String,
    pub grounding: Vec<GroundingRecord>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, SearchError>;

    fn name(&self) -> &'static str;
}

/// Stand-in when no backend has credentials
pub struct DisabledSearch;

#[async_trait]
impl WebSearch for DisabledSearch {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchOutcome, SearchError> {
        Err(SearchError::NoApiKey)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

pub fn build_search(config: &Config) -> Arc<dyn WebSearch> {
    match config.search.backend.to_lowercase().as_str() {
        "serpapi" => match SerpApiClient::from_config(&config.search) {
            Some(client) => {
                info!(backend = "serpapi", "Web search configured");
                Arc::new(client)
            }
            None => {
                warn!("SEARCH_BACKEND=serpapi but SERPAPI_API_KEY is not set - web search disabled");
                Arc::new(DisabledSearch)
            }
        },
        backend => {
            if backend != "gemini" {
                warn!(backend = %backend, "Unknown SEARCH_BACKEND, falling back to gemini");
            }
            match GroundedSearch::from_config(config) {
                Some(search) => {
                    info!(backend = "gemini", model = %config.llm.search_model, "Web search configured");
                    Arc::new(search)
                }
                None => {
                    warn!("GOOGLE_API_KEY is not set - web search disabled");
                    Arc::new(DisabledSearch)
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_search_reports_missing_key() {
        let result = DisabledSearch.search(&SearchQuery::new("anything", "")).await;
        assert!(matches!(result, Err(SearchError::NoApiKey)));
    }

    #[test]
    fn test_build_search_without_keys_is_disabled() {
        let mut config = Config::offline();
        assert_eq!(build_search(&config).name(), "disabled");

        config.search.backend = "serpapi".to_string();
        assert_eq!(build_search(&config).name(), "disabled");

        config.search.serpapi_key = "serp-key".to_string();
        assert_eq!(build_search(&config).name(), "serpapi");
    }
}
