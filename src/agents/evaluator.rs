//! Evaluator Agent
//!
//! Grades the findings gathered so far against the pipeline's criteria.
//! A reply that cannot be read as a verdict yields no verdict at all, which
//! the review loop treats as a fail.

use tracing::{info, warn};

use super::{llm_for, ResearchRun};
use crate::config::Config;
use crate::review::{ReviewVerdict, SearchQuery};
use crate::types::{AppResult, LLMMessage, LLMRequest};
use crate::utils::extract_json_block;

/// Offline grading bar: distinct sources needed for a pass
const MIN_SOURCES: usize = 3;

pub struct EvaluatorAgent;

impl EvaluatorAgent {
    pub async fn evaluate(run: &ResearchRun, config: &Config) -> AppResult<Option<ReviewVerdict>> {
        let Some(llm) = llm_for(&config.llm.critic_provider, config) else {
            warn!("No LLM API key configured for evaluation, grading by source coverage");
            return Ok(Some(Self::coverage_verdict(run)));
        };

        let request = LLMRequest {
            provider: config.llm.critic_provider.clone(),
            model: config.llm.critic_model.clone(),
            messages: vec![LLMMessage::user(Self::create_evaluation_prompt(run))],
            max_tokens: Some(2048),
            temperature: Some(0.0),
            system_instruction: Some(
                "You are a demanding research reviewer. Judge only what the findings show.".to_string(),
            ),
            web_search: false,
        };

        let response = llm.create_chat_completion(&request).await?;
        let verdict = Self::parse_verdict(&response.content);
        match &verdict {
            Some(v) => info!(
                provider = llm.provider_name(),
                grade = ?v.grade,
                follow_ups = v.follow_up_queries.len(),
                "Research evaluation received"
            ),
            None => warn!(reply_len = response.content.len(), "Evaluator reply was not a verdict"),
        }
        Ok(verdict)
    }

    pub fn parse_verdict(response: &str) -> Option<ReviewVerdict> {
        serde_json::from_str(extract_json_block(response)).ok()
    }

    /// Pass once enough distinct sources back the findings; otherwise ask
    /// for the phases nothing has covered yet
    pub fn coverage_verdict(run: &ResearchRun) -> ReviewVerdict {
        if !run.findings.is_empty() && run.ledger.len() >= MIN_SOURCES {
            return ReviewVerdict::pass(format!(
                "{} findings backed by {} sources",
                run.findings.len(),
                run.ledger.len()
            ));
        }

        let follow_ups = run
            .kind
            .research_phases()
            .iter()
            .filter(|phase| !run.findings.iter().any(|f| f.query.research_phase == **phase))
            .map(|phase| {
                SearchQuery::new(
                    format!("{} {}", run.request.topic, phase.replace('_', " ")),
                    *phase,
                )
            })
            .collect();

        ReviewVerdict::fail(
            format!(
                "Only {} sources found; at least {} are needed",
                run.ledger.len(),
                MIN_SOURCES
            ),
            follow_ups,
        )
    }

    fn create_evaluation_prompt(run: &ResearchRun) -> String {
        format!(
            r#"Evaluate the research gathered for a {title} report on: {topic}

CRITERIA:
{criteria}

FINDINGS:
{findings}

SOURCES:
{sources}

Grade "pass" only if the findings meet every criterion with specific, sourced facts.
Otherwise grade "fail" and list the follow-up searches that would close the gaps.

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "grade": "pass" | "fail",
  "comment": "What is strong and what is missing",
  "follow_up_queries": [
    {{"search_query": "...", "research_phase": "one of: {phases}", "target_entity": null}}
  ]
}}"#,
            title = run.kind.title(),
            topic = run.request.topic,
            criteria = run.kind.evaluation_criteria(),
            findings = run.findings_digest(),
            sources = run.ledger.describe(),
            phases = run.kind.research_phases().join(", "),
        )
    }
}
