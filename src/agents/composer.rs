//! Report Composer
//!
//! Writes the report draft. Sources are cited with `<cite source="src-N" />`
//! markers which the citation rewriter later turns into numbered references.

use tracing::{error, info, warn};

use super::{llm_for, ResearchRun};
use crate::citations::ReportDraft;
use crate::config::Config;
use crate::types::{LLMMessage, LLMRequest};

const CONTEXT_CHARS: usize = 6000;
const CLAIMS_PER_SOURCE: usize = 2;

pub struct ReportComposer;

impl ReportComposer {
    pub async fn compose(run: &ResearchRun, config: &Config) -> ReportDraft {
        let Some(llm) = llm_for(&config.llm.worker_provider, config) else {
            warn!(provider = %config.llm.worker_provider, "No LLM API key configured for composition, assembling draft from findings");
            return Self::fallback_draft(run);
        };

        let request = LLMRequest {
            provider: config.llm.worker_provider.clone(),
            model: config.llm.worker_model.clone(),
            messages: vec![LLMMessage::user(Self::create_report_prompt(run))],
            max_tokens: Some(8192),
            temperature: Some(0.4),
            system_instruction: Some(
                "You are a market intelligence analyst writing reports for B2B sales teams.".to_string(),
            ),
            web_search: false,
        };

        match llm.create_chat_completion(&request).await {
            Ok(response) => {
                let text = strip_markdown_fence(&response.content);
                if text.is_empty() {
                    warn!("Composer returned an empty report, assembling draft from findings");
                    return Self::fallback_draft(run);
                }
                info!(draft_len = text.len(), "Report draft composed");
                ReportDraft::new(text)
            }
            Err(e) => {
                error!(error = %e, "Composer LLM call failed, assembling draft from findings");
                Self::fallback_draft(run)
            }
        }
    }

    /// Deterministic draft: each finding cited to its sources, then the
    /// strongest claims recorded for every source
    pub fn fallback_draft(run: &ResearchRun) -> ReportDraft {
        let mut draft = ReportDraft::new(format!("# {}: {}\n\n", run.kind.title(), run.request.topic));

        if !run.plan.summary.trim().is_empty() {
            draft.push_str(&format!("{}\n\n", run.plan.summary.trim()));
        }

        draft.push_str("## Findings\n\n");
        if run.findings.is_empty() {
            draft.push_str("No research findings were gathered for this topic.\n");
            return draft;
        }

        for finding in &run.findings {
            draft.push_str(&format!(
                "### {}\n\n{}",
                finding.query.search_query,
                finding.summary.trim()
            ));
            for id in &finding.sources {
                draft.push_str(&format!(" <cite source=\"{}\" />", id));
            }
            draft.push_str("\n\n");
        }

        let evidence: Vec<String> = run
            .ledger
            .all_sources()
            .iter()
            .flat_map(|source| {
                let mut claims: Vec<_> = source.supported_claims.iter().collect();
                claims.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                claims
                    .into_iter()
                    .take(CLAIMS_PER_SOURCE)
                    .map(|c| format!("- {} <cite source=\"{}\" />", c.text_segment.trim(), source.identifier))
                    .collect::<Vec<_>>()
            })
            .collect();

        if !evidence.is_empty() {
            draft.push_str("## Source Evidence\n\n");
            draft.push_str(&evidence.join("\n"));
            draft.push_str("\n");
        }

        draft
    }

    fn create_report_prompt(run: &ResearchRun) -> String {
        format!(
            r#"Write a {title} report on: {topic}

REPORT OUTLINE (one markdown section per item):
{outline}

RESEARCH FINDINGS:
{findings}

AVAILABLE SOURCES:
{sources}

EARLIER REPORTS AND CONTEXT:
{context}

CITATION RULES:
- Cite facts with a marker placed right after the sentence it supports: <cite source="src-N" />
- Use only identifiers from AVAILABLE SOURCES; never invent one
- Do not write a references or sources section; it is added automatically

Write the report in markdown. Be specific: figures, names, dates."#,
            title = run.kind.title(),
            topic = run.request.topic,
            outline = run.kind.report_outline().replace("; ", "\n"),
            findings = run.findings_digest(),
            sources = run.ledger.describe(),
            context = run.request.context_block(CONTEXT_CHARS),
        )
    }
}

/// Models sometimes wrap the whole report in a ```markdown fence
fn strip_markdown_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}
