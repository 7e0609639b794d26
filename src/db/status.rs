// Project status callback

use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::config::StatusConfig;
use crate::pipelines::PipelineKind;
use crate::types::{AppError, AppResult};

/// Tells the project service which report field changed
#[derive(Clone)]
pub struct StatusNotifier {
    client: Client,
    base_url: Option<String>,
}

impl StatusNotifier {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn from_config(config: &StatusConfig) -> Self {
        Self::new(config.callback_base_url.clone())
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// `Ok(false)` when no callback URL is configured
    pub async fn notify(&self, project_id: &str, kind: PipelineKind) -> AppResult<bool> {
        let Some(base_url) = &self.base_url else {
            debug!(project_id = %project_id, "Status callback disabled");
            return Ok(false);
        };

        let url = format!("{}/project/project-status-update/{}/", base_url, project_id);
        let response = self
            .client
            .put(&url)
            .json(&json!({ "sub_status": format!("{} updated", kind.report_field()) }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Status callback returned {}: {}",
                status, body
            )));
        }

        info!(project_id = %project_id, field = kind.report_field(), "Status callback sent");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_notify_puts_sub_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/project/project-status-update/p-9/")
            .match_body(Matcher::Json(json!({"sub_status": "market_segment updated"})))
            .with_status(200)
            .create_async()
            .await;

        let notifier = StatusNotifier::new(Some(format!("{}/", server.url())));
        assert!(notifier.notify("p-9", PipelineKind::Segmentation).await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_notify_surfaces_server_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/project/project-status-update/p-9/")
            .with_status(500)
            .create_async()
            .await;

        let notifier = StatusNotifier::new(Some(server.url()));
        assert!(notifier.notify("p-9", PipelineKind::ProspectResearch).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_a_no_op() {
        let notifier = StatusNotifier::disabled();
        assert!(!notifier.is_enabled());
        assert!(!notifier.notify("p-9", PipelineKind::MarketContext).await.unwrap());
    }
}
