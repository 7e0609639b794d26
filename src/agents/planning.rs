//! Planning Agent
//!
//! Turns the research topic into an initial set of search queries spread
//! across the pipeline's research phases.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{llm_for, ResearchRequest};
use crate::config::Config;
use crate::pipelines::PipelineKind;
use crate::review::SearchQuery;
use crate::types::{LLMMessage, LLMRequest};
use crate::utils::extract_json_block;

const MAX_PLANNED_QUERIES: usize = 8;
const CONTEXT_CHARS: usize = 4000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchPlan {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub queries: Vec<SearchQuery>,
}

pub struct PlanningAgent;

impl PlanningAgent {
    pub async fn generate_plan(kind: PipelineKind, request: &ResearchRequest, config: &Config) -> ResearchPlan {
        let Some(llm) = llm_for(&config.llm.critic_provider, config) else {
            warn!(provider = %config.llm.critic_provider, "No LLM API key configured for planning, using single-query plan");
            return Self::fallback_plan(kind, request);
        };

        let llm_request = LLMRequest {
            provider: config.llm.critic_provider.clone(),
            model: config.llm.critic_model.clone(),
            messages: vec![LLMMessage::user(Self::create_plan_prompt(kind, request))],
            max_tokens: Some(2048),
            temperature: Some(0.3),
            system_instruction: Some(
                "You are a senior market research strategist. You plan web searches; you do not answer them.".to_string(),
            ),
            web_search: false,
        };

        match llm.create_chat_completion(&llm_request).await {
            Ok(response) => match Self::parse_plan(&response.content) {
                Some(plan) => {
                    info!(query_count = plan.queries.len(), "Research plan generated");
                    plan
                }
                None => {
                    warn!("Could not parse research plan, using single-query plan");
                    Self::fallback_plan(kind, request)
                }
            },
            Err(e) => {
                error!(error = %e, "Planning LLM call failed, using single-query plan");
                Self::fallback_plan(kind, request)
            }
        }
    }

    /// One broad query over the topic and the pipeline's focus
    pub fn fallback_plan(kind: PipelineKind, request: &ResearchRequest) -> ResearchPlan {
        let phase = kind.research_phases().first().copied().unwrap_or_default();
        ResearchPlan {
            summary: format!("{} for {}", kind.title(), request.topic),
            queries: vec![SearchQuery::new(
                format!("{} {}", request.topic, kind.title().to_lowercase()),
                phase,
            )],
        }
    }

    fn create_plan_prompt(kind: PipelineKind, request: &ResearchRequest) -> String {
        format!(
            r#"Plan the web research for a {title} report.

TOPIC: {topic}

RESEARCH FOCUS:
{focus}

RESEARCH PHASES: {phases}

EXISTING CONTEXT:
{context}

Write between 3 and {max} specific search queries that together cover every phase.
Prefer queries that will surface figures, named companies and recent dates.

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "summary": "One paragraph describing the research approach",
  "queries": [
    {{"search_query": "...", "research_phase": "one of the phases above", "target_entity": "company or person, or null"}}
  ]
}}"#,
            title = kind.title(),
            topic = request.topic,
            focus = kind.research_focus(),
            phases = kind.research_phases().join(", "),
            context = request.context_block(CONTEXT_CHARS),
            max = MAX_PLANNED_QUERIES,
        )
    }

    fn parse_plan(response: &str) -> Option<ResearchPlan> {
        let mut plan: ResearchPlan = serde_json::from_str(extract_json_block(response)).ok()?;
        plan.queries.retain(|q| !q.search_query.trim().is_empty());
        plan.queries.truncate(MAX_PLANNED_QUERIES);
        if plan.queries.is_empty() {
            None
        } else {
            Some(plan)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_from_fenced_json() {
        let reply = r#"```json
{"summary": "Size then segment", "queries": [
  {"search_query": "EV charger market size Europe 2024", "research_phase": "market_sizing"},
  {"search_query": "  ", "research_phase": "market_sizing"},
  {"search_query": "ChargePoint revenue", "research_phase": "competition", "target_entity": "ChargePoint"}
]}
```"#;
        let plan = PlanningAgent::parse_plan(reply).unwrap();
        assert_eq!(plan.queries.len(), 2);
        assert_eq!(plan.queries[1].target_entity.as_deref(), Some("ChargePoint"));
    }

    #[test]
    fn test_parse_plan_rejects_empty() {
        assert!(PlanningAgent::parse_plan(r#"{"summary": "x", "queries": []}"#).is_none());
        assert!(PlanningAgent::parse_plan("I cannot help with that").is_none());
    }

    #[tokio::test]
    async fn test_offline_plan_is_single_query() {
        let request = ResearchRequest::new("Vertical farming");
        let plan = PlanningAgent::generate_plan(PipelineKind::MarketContext, &request, &Config::offline()).await;
        assert_eq!(plan.queries.len(), 1);
        assert!(plan.queries[0].search_query.starts_with("Vertical farming"));
        assert_eq!(plan.queries[0].research_phase, "market_sizing");
    }
}
