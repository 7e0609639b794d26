use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::agents::{execute_research_pipeline, execute_suite, ResearchRequest};
use crate::db::store_report;
use crate::models::{
    AppState, CreateProjectRequest, CreateProjectResponse, ProjectRecord, ReportRequest, ReportResponse,
    SuiteRequest,
};
use crate::pipelines::PipelineKind;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/projects", post(create_project))
        .route("/api/projects/{project_id}", get(get_project))
        .route("/api/projects/{project_id}/reports", post(generate_report))
        .route("/api/projects/{project_id}/suite", post(generate_suite))
        .with_state(state)
}

async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<CreateProjectResponse>)> {
    let project_id = match request.project_id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() => id,
        Some(_) => return Err(AppError::InvalidRequest("project_id must not be blank".to_string())),
        None => Uuid::new_v4().to_string(),
    };

    let created = state.store.create_blank_project(&project_id).await?;
    info!(project_id = %project_id, created, "Project requested");

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(CreateProjectResponse { project_id, created })))
}

async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<ProjectRecord>> {
    let project = require_project(&state, &project_id).await?;
    Ok(Json(project))
}

async fn generate_report(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<ReportRequest>,
) -> AppResult<Json<ReportResponse>> {
    require_project(&state, &project_id).await?;
    info!(project_id = %project_id, pipeline = %request.pipeline, "Report requested");

    let mut research = ResearchRequest::new(request.topic).with_project(&project_id);
    if let Some(context) = request.context.filter(|c| !c.trim().is_empty()) {
        research = research.with_context("Provided context", context);
    }

    let report = execute_research_pipeline(request.pipeline, research, &state.config, state.search.as_ref()).await?;
    let stored = store_report(
        state.store.as_ref(),
        &state.notifier,
        &project_id,
        &report.report,
        request.pipeline,
    )
    .await;

    Ok(Json(ReportResponse::new(&project_id, report, stored)))
}

async fn generate_suite(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<SuiteRequest>,
) -> AppResult<Json<Vec<ReportResponse>>> {
    require_project(&state, &project_id).await?;
    let kinds = request.pipelines.unwrap_or_else(PipelineKind::suite);

    let reports = execute_suite(
        &project_id,
        &request.topic,
        &kinds,
        &state.config,
        state.search.as_ref(),
        state.store.as_ref(),
        &state.notifier,
    )
    .await?;

    Ok(Json(
        reports
            .into_iter()
            .map(|(report, stored)| ReportResponse::new(&project_id, report, stored))
            .collect(),
    ))
}

async fn require_project(state: &AppState, project_id: &str) -> AppResult<ProjectRecord> {
    state
        .store
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No project found with project_id '{}'", project_id)))
}
