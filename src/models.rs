use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::PipelineReport;
use crate::config::Config;
use crate::db::{ProjectStore, StatusNotifier};
use crate::pipelines::PipelineKind;
use crate::review::LoopOutcome;
use crate::search::WebSearch;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProjectStore>,
    pub search: Arc<dyn WebSearch>,
    pub notifier: StatusNotifier,
}

// Note: FromRow is needed for runtime query_as (without DATABASE_URL at compile time)

/// One project document: a report slot per pipeline
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectRecord {
    pub project_id: String,
    pub market_context: Option<String>,
    pub market_segment: Option<String>,
    pub client_org_research: Option<String>,
    pub target_org_research: Option<String>,
    pub prospect_research: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ProjectRecord {
    pub fn blank(project_id: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            project_id: project_id.to_string(),
            market_context: None,
            market_segment: None,
            client_org_research: None,
            target_org_research: None,
            prospect_research: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn report(&self, kind: PipelineKind) -> Option<&str> {
        match kind {
            PipelineKind::MarketContext => self.market_context.as_deref(),
            PipelineKind::Segmentation => self.market_segment.as_deref(),
            PipelineKind::ClientOrgResearch => self.client_org_research.as_deref(),
            PipelineKind::TargetOrgResearch => self.target_org_research.as_deref(),
            PipelineKind::ProspectResearch => self.prospect_research.as_deref(),
        }
    }

    pub fn set_report(&mut self, kind: PipelineKind, report: &str) {
        let slot = match kind {
            PipelineKind::MarketContext => &mut self.market_context,
            PipelineKind::Segmentation => &mut self.market_segment,
            PipelineKind::ClientOrgResearch => &mut self.client_org_research,
            PipelineKind::TargetOrgResearch => &mut self.target_org_research,
            PipelineKind::ProspectResearch => &mut self.prospect_research,
        };
        *slot = Some(report.to_string());
        self.updated_at = chrono::Utc::now();
    }
}

// API request/response types

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    /// Generated when omitted
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateProjectResponse {
    pub project_id: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub pipeline: PipelineKind,
    pub topic: String,
    /// Extra material for the planner and composer, e.g. earlier reports
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuiteRequest {
    pub topic: String,
    /// Defaults to segmentation, client org and prospect research
    #[serde(default)]
    pub pipelines: Option<Vec<PipelineKind>>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub project_id: String,
    pub pipeline: PipelineKind,
    pub field: &'static str,
    pub report: String,
    pub stored: bool,
    pub outcome: LoopOutcome,
    pub evaluations: u32,
    pub source_count: usize,
    pub cited_count: usize,
    pub warnings: Vec<String>,
}

impl ReportResponse {
    pub fn new(project_id: &str, report: PipelineReport, stored: bool) -> Self {
        Self {
            project_id: project_id.to_string(),
            pipeline: report.kind,
            field: report.kind.report_field(),
            stored,
            outcome: report.loop_summary.outcome,
            evaluations: report.loop_summary.evaluations,
            source_count: report.sources.len(),
            cited_count: report.cited.len(),
            warnings: report.warnings,
            report: report.report,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PipelineInfo {
    pub name: &'static str,
    pub title: &'static str,
    pub field: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub store_ok: bool,
    pub search: &'static str,
}
