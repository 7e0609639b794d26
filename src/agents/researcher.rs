//! Research Agent
//!
//! Runs search queries, records every grounding record in the run's source
//! ledger and keeps the returned summaries as findings.

use serde::Serialize;
use tracing::{info, warn};

use super::ResearchRun;
use crate::review::{ReviewVerdict, SearchQuery};
use crate::search::{SearchError, WebSearch};
use crate::types::{AppError, AppResult};

const MAX_FOLLOW_UPS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub query: SearchQuery,
    pub summary: String,
    /// Ledger identifiers of the sources behind this finding
    pub sources: Vec<String>,
}

pub struct ResearchAgent;

impl ResearchAgent {
    /// Run each query in turn. Individual failures are skipped; only a batch
    /// in which every query failed is an error.
    pub async fn run_queries(
        run: &mut ResearchRun,
        queries: &[SearchQuery],
        search: &dyn WebSearch,
    ) -> AppResult<usize> {
        let mut succeeded = 0;
        let mut last_error: Option<SearchError> = None;

        for query in queries {
            match search.search(query).await {
                Ok(outcome) => {
                    run.ledger.ingest(&outcome.grounding);

                    let mut sources: Vec<String> = Vec::new();
                    for record in &outcome.grounding {
                        if let Some(id) = run.ledger.identifier_for(&record.url) {
                            if !sources.iter().any(|s| s == id) {
                                sources.push(id.to_string());
                            }
                        }
                    }

                    info!(
                        query = %query.search_query,
                        records = outcome.grounding.len(),
                        sources = sources.len(),
                        "Search results recorded"
                    );
                    run.findings.push(Finding {
                        query: query.clone(),
                        summary: outcome.summary,
                        sources,
                    });
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(query = %query.search_query, error = %e, "Search failed, skipping query");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(AppError::Search(e)),
            _ => Ok(succeeded),
        }
    }

    /// Follow-up research for a failing (or missing) verdict
    pub async fn enhance(
        run: &mut ResearchRun,
        verdict: Option<&ReviewVerdict>,
        search: &dyn WebSearch,
    ) -> AppResult<usize> {
        let queries = Self::follow_up_queries(run, verdict);
        info!(count = queries.len(), "Running follow-up searches");
        Self::run_queries(run, &queries, search).await
    }

    fn follow_up_queries(run: &ResearchRun, verdict: Option<&ReviewVerdict>) -> Vec<SearchQuery> {
        if let Some(v) = verdict {
            if !v.follow_up_queries.is_empty() {
                return v.follow_up_queries.iter().take(MAX_FOLLOW_UPS).cloned().collect();
            }
            if !v.comment.trim().is_empty() {
                return vec![SearchQuery::new(
                    format!("{} {}", run.request.topic, v.comment.trim()),
                    "gap_filling",
                )];
            }
        }
        vec![SearchQuery::new(
            format!("{} {}", run.request.topic, run.kind.research_focus()),
            "gap_filling",
        )]
    }
}
