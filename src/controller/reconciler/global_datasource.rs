//! # GlobalDatasource Reconciliation
//!
//! A GlobalDatasource maps to `global/<name>` in DAS. Git credentials come
//! from the referenced Secret or, without one, from the controller's default
//! credentials; the datasource is only written when it differs.

use super::credentials::{read_credentials_secret, resolve, GitAuth};
use super::error::{EventReason, ReconcileError};
use super::types::{resource_key, Reconciler, ReconcilerError};
use super::validation::validate_url;
use crate::cluster::EventRecord;
use crate::crd::{class_matches, GlobalDatasource};
use crate::observability::metrics;
use crate::provider::das::DatasourceConfig;
use anyhow::{Context, Result};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

const KIND: &str = "GlobalDatasource";

/// Datasources backed by git are pulled by DAS
const DATASOURCE_TYPE_PULL: &str = "pull";

/// Reconcile one GlobalDatasource
pub async fn reconcile_global_datasource(
    obj: Arc<GlobalDatasource>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let span = info_span!("reconcile", resource.kind = KIND, datasource.name = name.as_str());
    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(KIND);

        let Some(datasource) = ctx.cluster.get_global_datasource(&name).await? else {
            return Ok(Action::await_change());
        };
        if !class_matches(&datasource, &ctx.config.controller_class)
            || datasource.metadata.deletion_timestamp.is_some()
        {
            return Ok(Action::await_change());
        }

        info!("🔄 Reconciling GlobalDatasource {}", name);
        let result = ctx.sync_global_datasource(&datasource).await;
        metrics::observe_reconciliation_duration(KIND, start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                ctx.reset_backoff(&resource_key(KIND, None, &name));
                info!("✅ GlobalDatasource {} in sync", datasource.datasource_id());
                Ok(Action::requeue(ctx.config.resync_interval()))
            }
            Err(cause) => {
                metrics::increment_reconciliation_errors(KIND);
                let e = ReconcileError::new(cause).with_event(EventReason::FailedSyncGlobalDatasource);
                if e.is_user_error() {
                    warn!("GlobalDatasource {} needs attention: {}", name, e);
                } else {
                    metrics::increment_reported_errors();
                    error!("❌ Reconciliation failed for GlobalDatasource {}: {}", name, e);
                }
                let event = EventRecord::warning(
                    EventReason::FailedSyncGlobalDatasource.as_str(),
                    "Reconcile",
                    e.to_string(),
                );
                if let Err(publish_error) = ctx.cluster.publish_event(&datasource.object_ref(&()), &event).await {
                    warn!("Failed to publish event: {}", publish_error);
                }
                Err(e.into())
            }
        }
    }
    .instrument(span)
    .await
}

/// True when `current` already carries every field we manage
fn datasource_matches(current: &DatasourceConfig, desired: &DatasourceConfig) -> bool {
    current.category == desired.category
        && current.description == desired.description
        && current.enabled == desired.enabled
        && current.url == desired.url
        && current.reference == desired.reference
        && current.commit == desired.commit
        && current.path == desired.path
        && current.credentials == desired.credentials
}

impl Reconciler {
    async fn global_datasource_credentials(&self, datasource: &GlobalDatasource) -> Result<Option<GitAuth>> {
        if let Some(secret_ref) = &datasource.spec.credentials_secret_ref {
            return read_credentials_secret(
                self.cluster.as_ref(),
                &secret_ref.namespace,
                &secret_ref.name,
                "username",
                "password",
            )
            .await
            .map(Some);
        }
        Ok(datasource
            .spec
            .url
            .as_deref()
            .and_then(|url| resolve(&self.config.git_credentials, url))
            .map(GitAuth::from))
    }

    async fn sync_global_datasource(&self, datasource: &GlobalDatasource) -> Result<()> {
        let id = datasource.datasource_id();
        let spec = &datasource.spec;
        if let Some(url) = &spec.url {
            validate_url(url).context("Invalid datasource url")?;
        }

        let credentials = self.global_datasource_credentials(datasource).await?;
        let secret_id = match credentials {
            Some(auth) => {
                let secret_id = datasource.secret_id();
                self.das
                    .create_update_secret(&secret_id, &auth.user, &auth.password)
                    .await
                    .context("Failed to update datasource git credentials")?;
                secret_id
            }
            None => String::new(),
        };

        let desired = DatasourceConfig {
            id: id.clone(),
            category: spec.category.clone(),
            description: spec.description.clone(),
            type_: if spec.url.is_some() {
                DATASOURCE_TYPE_PULL.to_string()
            } else {
                String::new()
            },
            enabled: spec.enabled,
            url: spec.url.clone().unwrap_or_default(),
            reference: spec.reference.clone().unwrap_or_default(),
            commit: spec.commit.clone().unwrap_or_default(),
            path: spec.path.clone().unwrap_or_default(),
            credentials: secret_id,
        };

        let current = self
            .das
            .get_datasource(&id)
            .await
            .context("Failed to get datasource")?;
        if current.as_ref().is_some_and(|c| datasource_matches(c, &desired)) {
            debug!(datasource.id = id.as_str(), "Datasource up to date");
            return Ok(());
        }
        info!("🔄 Upserting datasource {} in DAS", id);
        self.das
            .upsert_datasource(&id, &desired)
            .await
            .context("Failed to upsert datasource")?;
        Ok(())
    }
}
