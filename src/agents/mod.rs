//! Agent System
//!
//! The agents behind every market-research pipeline:
//!
//! - **Planning Agent**: turns the topic into a set of search queries
//! - **Research Agent**: runs queries and records the evidence in the run's ledger
//! - **Evaluator Agent**: grades the findings and asks for follow-up searches
//! - **Report Composer**: writes the report with `<cite source="src-N" />` markers
//!
//! ## Pipeline Overview
//!
//! ```text
//! Topic + context
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Planning   │  → search queries
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐     fail, budget left
//! │  Research   │ ◄──────────────────────┐
//! └─────────────┘                        │
//!      │                                 │
//!      ▼                                 │
//! ┌─────────────┐                        │
//! │  Evaluator  │ ───────────────────────┘
//! └─────────────┘
//!      │ pass / budget spent
//!      ▼
//! ┌─────────────┐
//! │  Composer   │  → draft with citation markers
//! └─────────────┘
//!      │
//!      ▼
//!  Citation rewrite → stored report
//! ```

pub mod composer;
pub mod evaluator;
pub mod planning;
pub mod researcher;

pub use composer::ReportComposer;
pub use evaluator::EvaluatorAgent;
pub use planning::{PlanningAgent, ResearchPlan};
pub use researcher::{Finding, ResearchAgent};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::citations::{CitationRewriter, Source, SourceLedger};
use crate::config::Config;
use crate::db::{store_report, ProjectStore, StatusNotifier};
use crate::llm::{LLMProviderConfig, LLM};
use crate::pipelines::PipelineKind;
use crate::review::{BoundedReviewLoop, LoopSummary, ReviewSteps, ReviewVerdict};
use crate::search::WebSearch;
use crate::types::{AppError, AppResult};

/// What to research, and what is already known
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Earlier reports or user notes, as (label, text) pairs
    #[serde(default)]
    pub context: Vec<(String, String)>,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_context(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.context.push((label.into(), text.into()));
        self
    }

    /// Context block for prompts, each entry cut to `max_chars`
    pub fn context_block(&self, max_chars: usize) -> String {
        if self.context.is_empty() {
            return "None provided.".to_string();
        }
        self.context
            .iter()
            .map(|(label, text)| {
                let mut excerpt: String = text.chars().take(max_chars).collect();
                if text.chars().count() > max_chars {
                    excerpt.push_str(" […]");
                }
                format!("### {}\n{}", label, excerpt)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// State of one pipeline run. The ledger lives exactly as long as the run.
#[derive(Debug)]
pub struct ResearchRun {
    pub kind: PipelineKind,
    pub request: ResearchRequest,
    pub plan: ResearchPlan,
    pub findings: Vec<Finding>,
    pub ledger: SourceLedger,
}

impl ResearchRun {
    pub fn new(kind: PipelineKind, request: ResearchRequest) -> Self {
        Self {
            kind,
            request,
            plan: ResearchPlan::default(),
            findings: Vec::new(),
            ledger: SourceLedger::new(),
        }
    }

    /// Findings as prompt text, each tagged with the sources behind it
    pub fn findings_digest(&self) -> String {
        if self.findings.is_empty() {
            return "No findings yet.".to_string();
        }
        self.findings
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let sources = if f.sources.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", f.sources.join(", "))
                };
                format!(
                    "### Finding {} ({}): {}{}\n{}",
                    i + 1,
                    f.query.research_phase,
                    f.query.search_query,
                    sources,
                    f.summary.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub kind: PipelineKind,
    pub topic: String,
    /// Final report with citations rewritten and references appended
    pub report: String,
    /// Identifiers of the sources the report actually cites
    pub cited: Vec<String>,
    pub sources: Vec<Source>,
    pub loop_summary: LoopSummary,
    pub warnings: Vec<String>,
}

/// LLM for one agent role, or None when the provider has no key configured
pub(crate) fn llm_for(provider: &str, config: &Config) -> Option<LLM> {
    let api_key = config.llm.api_key_for(provider)?;
    let base_url = match provider {
        "openai" | "openrouter" | "litellm" => config.llm.openai_base_url.clone(),
        _ => None,
    };
    match LLM::new(LLMProviderConfig::new(provider, api_key).with_base_url(base_url)) {
        Ok(llm) => Some(llm),
        Err(e) => {
            warn!(provider = %provider, error = %e, "Could not build LLM client");
            None
        }
    }
}

/// Wires the agents into the bounded review loop
struct PipelineSteps<'a> {
    config: &'a Config,
    search: &'a dyn WebSearch,
}

#[async_trait]
impl<'a> ReviewSteps<ResearchRun> for PipelineSteps<'a> {
    async fn research(&self, run: &mut ResearchRun) -> AppResult<()> {
        let queries = run.plan.queries.clone();
        ResearchAgent::run_queries(run, &queries, self.search).await?;
        Ok(())
    }

    async fn evaluate(&self, run: &ResearchRun) -> AppResult<Option<ReviewVerdict>> {
        EvaluatorAgent::evaluate(run, self.config).await
    }

    async fn enhance(&self, run: &mut ResearchRun, verdict: Option<&ReviewVerdict>) -> AppResult<()> {
        ResearchAgent::enhance(run, verdict, self.search).await?;
        Ok(())
    }
}

/// Plan, research under review, compose, then rewrite citations
pub async fn execute_research_pipeline(
    kind: PipelineKind,
    request: ResearchRequest,
    config: &Config,
    search: &dyn WebSearch,
) -> AppResult<PipelineReport> {
    if request.topic.trim().is_empty() {
        return Err(AppError::InvalidRequest("topic must not be empty".to_string()));
    }
    let review = BoundedReviewLoop::new(config.research.max_search_iterations)?;

    info!(
        pipeline = %kind,
        topic = %request.topic,
        search = search.name(),
        max_iterations = review.max_iterations(),
        "Starting research pipeline"
    );

    let mut run = ResearchRun::new(kind, request);

    // Step 1: Planning
    run.plan = PlanningAgent::generate_plan(kind, &run.request, config).await;
    info!(query_count = run.plan.queries.len(), "Planning complete");

    // Step 2: Research under bounded review
    let steps = PipelineSteps { config, search };
    let loop_summary = review.run(&steps, &mut run).await;
    info!(
        outcome = ?loop_summary.outcome,
        evaluations = loop_summary.evaluations,
        sources = run.ledger.len(),
        "Research complete"
    );

    // Step 3: Composition and citation rewrite
    let draft = ReportComposer::compose(&run, config).await;
    let rewriter = CitationRewriter::new(config.research.citation_style);
    let rendered = draft.finalize(&rewriter, &run.ledger);

    if !rendered.warnings.is_empty() {
        warn!(count = rendered.warnings.len(), "Report contained dangling citations");
    }
    info!(report_len = rendered.text.len(), cited = rendered.cited.len(), "Research pipeline complete");

    Ok(PipelineReport {
        kind,
        topic: run.request.topic.clone(),
        report: rendered.text,
        cited: rendered.cited,
        sources: run.ledger.all_sources().to_vec(),
        loop_summary,
        warnings: rendered.warnings,
    })
}

/// Run several pipelines for one project in order. Each completed report is
/// stored and handed to the pipelines after it as context. Every report comes
/// back paired with whether it was stored.
pub async fn execute_suite(
    project_id: &str,
    topic: &str,
    kinds: &[PipelineKind],
    config: &Config,
    search: &dyn WebSearch,
    store: &dyn ProjectStore,
    notifier: &StatusNotifier,
) -> AppResult<Vec<(PipelineReport, bool)>> {
    if kinds.is_empty() {
        return Err(AppError::InvalidRequest("no pipelines requested".to_string()));
    }
    info!(project_id = %project_id, pipelines = kinds.len(), "Starting report suite");

    let mut reports: Vec<(PipelineReport, bool)> = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let mut request = ResearchRequest::new(topic).with_project(project_id);
        for (previous, _) in &reports {
            request = request.with_context(previous.kind.title(), previous.report.clone());
        }

        let report = execute_research_pipeline(kind, request, config, search).await?;
        let stored = store_report(store, notifier, project_id, &report.report, kind).await;
        reports.push((report, stored));
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryProjectStore;
    use crate::review::LoopOutcome;
    use crate::search::testing::StaticSearch;
    use crate::search::DisabledSearch;

    #[tokio::test]
    async fn test_offline_pipeline_cites_found_sources() {
        let config = Config::offline();
        let search = StaticSearch::default();
        let report = execute_research_pipeline(
            PipelineKind::MarketContext,
            ResearchRequest::new("EV charging in Germany"),
            &config,
            &search,
        )
        .await
        .unwrap();

        assert!(!report.sources.is_empty());
        assert!(!report.cited.is_empty());
        assert!(report.report.contains("[[1]](#ref1)"));
        assert!(report.report.contains("## References"));
        assert!(!report.report.contains("<cite"));
        assert!(report.warnings.is_empty());
        assert!(report.loop_summary.evaluations <= config.research.max_search_iterations);
    }

    #[tokio::test]
    async fn test_pipeline_without_search_still_reports() {
        let config = Config::offline();
        let report = execute_research_pipeline(
            PipelineKind::Segmentation,
            ResearchRequest::new("Cold-chain logistics"),
            &config,
            &DisabledSearch,
        )
        .await
        .unwrap();

        assert_eq!(report.loop_summary.outcome, LoopOutcome::Exhausted);
        assert_eq!(report.loop_summary.evaluations, 2);
        assert!(report.sources.is_empty());
        assert!(!report.report.contains("## References"));
    }

    #[tokio::test]
    async fn test_empty_topic_rejected() {
        let result = execute_research_pipeline(
            PipelineKind::Segmentation,
            ResearchRequest::new("   "),
            &Config::offline(),
            &DisabledSearch,
        )
        .await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_suite_passes_context_and_stores_reports() {
        let config = Config::offline();
        let search = StaticSearch::default();
        let store = MemoryProjectStore::new();
        store.create_blank_project("p-1").await.unwrap();

        let reports = execute_suite(
            "p-1",
            "Industrial IoT sensors",
            &PipelineKind::suite(),
            &config,
            &search,
            &store,
            &StatusNotifier::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|(_, stored)| *stored));
        let project = store.get_project("p-1").await.unwrap().unwrap();
        assert!(project.market_segment.is_some());
        assert!(project.client_org_research.is_some());
        assert!(project.prospect_research.is_some());
        assert!(project.market_context.is_none());
    }

    #[test]
    fn test_context_block_truncates() {
        let request = ResearchRequest::new("t").with_context("Segmentation", "abcdefghij");
        let block = request.context_block(4);
        assert!(block.starts_with("### Segmentation\nabcd"));
        assert!(block.ends_with("[…]"));
        assert_eq!(ResearchRequest::new("t").context_block(10), "None provided.");
    }
}
