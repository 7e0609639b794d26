//! Project persistence
//!
//! Reports are stored per project under one field per pipeline. After every
//! successful update the project service is told which report changed.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::models::ProjectRecord;
use crate::pipelines::PipelineKind;
use crate::types::{AppError, AppResult};

pub mod postgres;
pub mod status;

pub use postgres::PgProjectStore;
pub use status::StatusNotifier;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Create an empty project. Returns `false` when it already existed.
    async fn create_blank_project(&self, project_id: &str) -> AppResult<bool>;

    /// Store `report` under the pipeline's report field.
    /// `AppError::NotFound` when no project has this id.
    async fn update_project_report(&self, project_id: &str, report: &str, kind: PipelineKind) -> AppResult<()>;

    async fn get_project(&self, project_id: &str) -> AppResult<Option<ProjectRecord>>;

    /// Whether the backing store answers
    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    fn backend(&self) -> &'static str;
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let url = config.url.as_deref().context("DATABASE_URL is not set")?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(url)
        .await?;

    // Test connection
    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    Ok(pool)
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn ProjectStore>> {
    if config.url.is_none() {
        warn!("DATABASE_URL is not set - reports are kept in memory only");
        return Ok(Arc::new(MemoryProjectStore::new()));
    }

    let pool = create_pool(config).await?;
    let store = PgProjectStore::new(pool);
    store.migrate().await?;
    info!("Connected to Postgres project store");
    Ok(Arc::new(store))
}

/// Persist a finished report and notify the project service.
///
/// Failures are logged and swallowed; a report that could not be stored is
/// still returned to the caller. Returns whether the update went through.
pub async fn store_report(
    store: &dyn ProjectStore,
    notifier: &StatusNotifier,
    project_id: &str,
    report: &str,
    kind: PipelineKind,
) -> bool {
    match store.update_project_report(project_id, report, kind).await {
        Ok(()) => {
            info!(project_id = %project_id, field = kind.report_field(), "Report stored");
        }
        Err(e) => {
            error!(project_id = %project_id, field = kind.report_field(), error = %e, "Failed to store report");
            return false;
        }
    }

    if let Err(e) = notifier.notify(project_id, kind).await {
        warn!(project_id = %project_id, error = %e, "Status callback failed");
    }
    true
}

/// In-process store for CLI runs without a database and for tests
#[derive(Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<String, ProjectRecord>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create_blank_project(&self, project_id: &str) -> AppResult<bool> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(project_id) {
            return Ok(false);
        }
        projects.insert(project_id.to_string(), ProjectRecord::blank(project_id));
        Ok(true)
    }

    async fn update_project_report(&self, project_id: &str, report: &str, kind: PipelineKind) -> AppResult<()> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| AppError::NotFound(format!("No project found with project_id '{}'", project_id)))?;
        project.set_report(kind, report);
        Ok(())
    }

    async fn get_project(&self, project_id: &str) -> AppResult<Option<ProjectRecord>> {
        Ok(self.projects.read().await.get(project_id).cloned())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
