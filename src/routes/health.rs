use axum::{extract::State, routing::get, Json, Router};
use tracing::warn;

use crate::models::{AppState, HealthResponse, PipelineInfo};
use crate::pipelines::PipelineKind;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/pipelines", get(list_pipelines))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_ok = match state.store.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(store = state.store.backend(), error = %e, "Project store health check failed");
            false
        }
    };

    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend(),
        store_ok,
        search: state.search.name(),
    })
}

async fn list_pipelines() -> Json<Vec<PipelineInfo>> {
    Json(
        PipelineKind::ALL
            .iter()
            .map(|k| PipelineInfo {
                name: k.name(),
                title: k.title(),
                field: k.report_field(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::StatusCode;

    use crate::db::ProjectStore;
    use crate::models::ProjectRecord;
    use crate::pipelines::PipelineKind;
    use crate::routes::create_router;
    use crate::routes::test_support::{offline_state, send};
    use crate::types::{AppError, AppResult};

    /// A store whose database has gone away
    struct UnreachableStore;

    #[async_trait]
    impl ProjectStore for UnreachableStore {
        async fn create_blank_project(&self, _project_id: &str) -> AppResult<bool> {
            Err(AppError::Internal("connection refused".into()))
        }

        async fn update_project_report(&self, _project_id: &str, _report: &str, _kind: PipelineKind) -> AppResult<()> {
            Err(AppError::Internal("connection refused".into()))
        }

        async fn get_project(&self, _project_id: &str) -> AppResult<Option<ProjectRecord>> {
            Err(AppError::Internal("connection refused".into()))
        }

        async fn health_check(&self) -> AppResult<bool> {
            Err(AppError::Internal("connection refused".into()))
        }

        fn backend(&self) -> &'static str {
            "postgres"
        }
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_store() {
        let mut state = offline_state();
        state.store = Arc::new(UnreachableStore);

        let (status, body) = send(create_router(state), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["store"], "postgres");
        assert_eq!(body["store_ok"], false);
    }
}
