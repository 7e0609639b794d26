// Postgres project store (sqlx, runtime-checked queries)

use async_trait::async_trait;
use sqlx::PgPool;

use super::ProjectStore;
use crate::models::ProjectRecord;
use crate::pipelines::PipelineKind;
use crate::types::{AppError, AppResult};

pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Column names come from the closed set of report fields, never from input
fn update_statement(kind: PipelineKind) -> String {
    format!(
        "UPDATE projects SET {} = $1, updated_at = NOW() WHERE project_id = $2",
        kind.report_field()
    )
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn create_blank_project(&self, project_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO projects (project_id) VALUES ($1) ON CONFLICT (project_id) DO NOTHING",
        )
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_project_report(&self, project_id: &str, report: &str, kind: PipelineKind) -> AppResult<()> {
        let result = sqlx::query(&update_statement(kind))
            .bind(report)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No project found with project_id '{}'",
                project_id
            )));
        }
        Ok(())
    }

    async fn get_project(&self, project_id: &str) -> AppResult<Option<ProjectRecord>> {
        let project = sqlx::query_as::<_, ProjectRecord>(
            r#"
            SELECT project_id, market_context, market_segment, client_org_research,
                   target_org_research, prospect_research, created_at, updated_at
            FROM projects
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_statement_targets_report_field() {
        assert_eq!(
            update_statement(PipelineKind::Segmentation),
            "UPDATE projects SET market_segment = $1, updated_at = NOW() WHERE project_id = $2"
        );
    }
}
