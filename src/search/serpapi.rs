//! SerpAPI Client
//!
//! Google Light results through SerpAPI. Each organic result registers its
//! page as a source and, when it has a snippet, attributes that snippet to it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{SearchError, SearchOutcome, WebSearch};
use crate::review::SearchQuery;
use crate::types::GroundingRecord;

/// Result from a Google Light search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
    /// Source domain
    pub source: Option<String>,
    pub date: Option<String>,
}

pub struct SerpApiClient {
    api_key: String,
    max_results: usize,
}

impl SerpApiClient {
    pub fn from_config(config: &crate::config::SearchConfig) -> Option<Self> {
        if config.serpapi_key.is_empty() {
            return None;
        }

        Some(Self {
            api_key: config.serpapi_key.clone(),
            max_results: config.max_results,
        })
    }

    /// Search Google Light for quick web results
    pub async fn search_light(&self, query: &str) -> Result<Vec<LightResult>, SearchError> {
        info!(query = %query, "Searching Google Light via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_light".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("gl".to_string(), "us".to_string());
        params.insert("num".to_string(), self.max_results.to_string());

        let search = SerpApiSearch::google(params, self.api_key.clone());

        let results = search
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        debug!("Raw Light response received");

        let light_results = parse_light_results(&results, self.max_results)?;
        info!(count = light_results.len(), "Google Light search completed");
        Ok(light_results)
    }
}

fn parse_light_results(results: &Value, max_results: usize) -> Result<Vec<LightResult>, SearchError> {
    if let Some(error) = results.get("error").and_then(|v| v.as_str()) {
        return Err(SearchError::RequestFailed(error.to_string()));
    }

    let organic_results = results.get("organic_results").ok_or(SearchError::NoResults)?;

    let results_array = organic_results
        .as_array()
        .ok_or_else(|| SearchError::ParseError("Expected array of results".to_string()))?;

    if results_array.is_empty() {
        return Err(SearchError::NoResults);
    }

    let mut light_results = Vec::new();
    for result in results_array.iter().take(max_results) {
        let link = result
            .get("link")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if link.is_empty() {
            continue;
        }

        let title = result
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled")
            .to_string();

        let snippet = result
            .get("snippet")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let source = result
            .get("source")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| url::Url::parse(&link).ok()?.host_str().map(String::from));

        let date = result.get("date").and_then(|v| v.as_str()).map(String::from);

        light_results.push(LightResult {
            title,
            snippet,
            link,
            source,
            date,
        });
    }

    Ok(light_results)
}

fn to_outcome(results: Vec<LightResult>) -> SearchOutcome {
    let mut summary = String::new();
    let mut grounding = Vec::with_capacity(results.len() * 2);

    for result in results {
        let domain = result.source.clone().unwrap_or_default();
        let record = GroundingRecord::new(&result.link, &result.title, domain);

        if result.snippet.is_empty() {
            grounding.push(record);
            continue;
        }

        summary.push_str(&format!("- {}: {}\n", result.title, result.snippet));
        // Snippets carry no relevance score; the ledger applies its default
        grounding.push(record.clone());
        grounding.push(record.with_claim(result.snippet, None));
    }

    SearchOutcome { summary, grounding }
}

#[async_trait]
impl WebSearch for SerpApiClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, SearchError> {
        let q = match &query.target_entity {
            Some(target) if !query.search_query.contains(target.as_str()) => {
                format!("{} {}", target, query.search_query)
            }
            _ => query.search_query.clone(),
        };
        let results = self.search_light(&q).await?;
        Ok(to_outcome(results))
    }

    fn name(&self) -> &'static str {
        "serpapi"
    }
}
