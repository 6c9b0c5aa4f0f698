//! # Change Notifications
//!
//! Fire-and-report POSTs telling downstream loaders that a datasource was
//! created. Callers log failures and carry on.

use super::{ClientError, ClientResult};
use crate::config::NotificationWebhooks;
use crate::observability::metrics;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

const WEBHOOK_TIMEOUT_SECS: u64 = 5;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn system_datasource_changed(&self, system_id: &str, datasource_id: &str) -> ClientResult<()>;
    async fn library_datasource_changed(&self, library_id: &str, datasource_id: &str) -> ClientResult<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemDatasourceChanged<'a> {
    system_id: &'a str,
    datasource_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LibraryDatasourceChanged<'a> {
    library_id: &'a str,
    datasource_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    urls: NotificationWebhooks,
}

impl WebhookNotifier {
    pub fn new(urls: NotificationWebhooks) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create webhook HTTP client: {e}"))?;
        Ok(Self { http, urls })
    }

    async fn post<T: Serialize + Sync>(&self, operation: &str, url: Option<&str>, body: &T) -> ClientResult<()> {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            debug!(operation, "No webhook configured, skipping notification");
            return Ok(());
        };
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                operation: operation.to_string(),
                source,
            })?;
        let status = response.status();
        metrics::record_external_request("webhook", operation, status.as_str());
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::http(operation, status.as_u16(), body))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn system_datasource_changed(&self, system_id: &str, datasource_id: &str) -> ClientResult<()> {
        let body = SystemDatasourceChanged {
            system_id,
            datasource_id,
        };
        self.post(
            "SystemDatasourceChanged",
            self.urls.system_datasource_changed.as_deref(),
            &body,
        )
        .instrument(info_span!("webhook.system_datasource_changed", system.id = system_id))
        .await
    }

    async fn library_datasource_changed(&self, library_id: &str, datasource_id: &str) -> ClientResult<()> {
        let body = LibraryDatasourceChanged {
            library_id,
            datasource_id,
        };
        self.post(
            "LibraryDatasourceChanged",
            self.urls.library_datasource_changed.as_deref(),
            &body,
        )
        .instrument(info_span!("webhook.library_datasource_changed", library.id = library_id))
        .await
    }
}
