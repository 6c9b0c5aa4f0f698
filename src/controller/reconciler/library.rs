//! # Library Reconciliation
//!
//! Libraries only exist in DAS. A reconcile syncs the git credentials, upserts
//! the library when its description or source control differ, then binds the
//! declared subjects and converges the declared datasources. Libraries have
//! no status; failures surface as Events and logs.

use super::credentials::resolve_git_auth;
use super::datasources::{diff, DatasourceOwner};
use super::error::{EventReason, ReconcileError};
use super::types::{resource_key, Reconciler, ReconcilerError};
use super::validation::validate_url;
use crate::cluster::EventRecord;
use crate::crd::{class_matches, Library};
use crate::provider::das::{GitRepoConfig, LibraryConfig, LibrarySourceControlConfig};
use crate::observability::metrics;
use anyhow::{Context, Result};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

const KIND: &str = "Library";

pub fn library_secret_id(library: &str) -> String {
    format!("libraries/{library}/git")
}

pub fn library_datasource_id(library: &str, path: &str) -> String {
    format!("libraries/{library}/{}", path.trim_matches('/'))
}

/// Reconcile one Library
pub async fn reconcile_library(obj: Arc<Library>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let span = info_span!(
        "reconcile",
        resource.kind = KIND,
        library.namespace = namespace.as_str(),
        library.name = name.as_str()
    );
    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(KIND);

        let Some(library) = ctx.cluster.get_library(&namespace, &name).await? else {
            return Ok(Action::await_change());
        };
        if !class_matches(&library, &ctx.config.controller_class)
            || library.metadata.deletion_timestamp.is_some()
        {
            return Ok(Action::await_change());
        }

        info!("🔄 Reconciling Library {}/{} ({})", namespace, name, library.spec.name);
        let result = ctx.sync_library(&library).await;
        metrics::observe_reconciliation_duration(KIND, start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                ctx.reset_backoff(&resource_key(KIND, Some(&namespace), &name));
                info!("✅ Library {} in sync", library.spec.name);
                Ok(Action::requeue(ctx.config.resync_interval()))
            }
            Err(cause) => {
                metrics::increment_reconciliation_errors(KIND);
                let e = ReconcileError::new(cause).with_event(EventReason::FailedSyncLibrary);
                if e.is_user_error() {
                    warn!("Library {}/{} needs attention: {}", namespace, name, e);
                } else {
                    metrics::increment_reported_errors();
                    error!("❌ Reconciliation failed for Library {}/{}: {}", namespace, name, e);
                }
                let event = EventRecord::warning(EventReason::FailedSyncLibrary.as_str(), "Reconcile", e.to_string());
                if let Err(publish_error) = ctx.cluster.publish_event(&library.object_ref(&()), &event).await {
                    warn!("Failed to publish event: {}", publish_error);
                }
                Err(e.into())
            }
        }
    }
    .instrument(span)
    .await
}

impl Reconciler {
    async fn sync_library(&self, library: &Library) -> Result<()> {
        let id = library.spec.name.as_str();
        let namespace = library.namespace().unwrap_or_default();
        let origin = library.spec.source_control.as_ref().map(|sc| &sc.library_origin);

        let mut credentials_synced = false;
        if let Some(origin) = origin {
            validate_url(&origin.url).context("Invalid library origin")?;
            let auth = resolve_git_auth(
                self.cluster.as_ref(),
                &self.config.git_credentials,
                &namespace,
                origin.credentials_secret_name.as_deref(),
                &origin.url,
            )
            .await?;
            if let Some(auth) = auth {
                self.das
                    .create_update_secret(&library_secret_id(id), &auth.user, &auth.password)
                    .await
                    .context("Failed to update library git credentials")?;
                credentials_synced = true;
            }
        }

        let current = self
            .das
            .get_library(id)
            .await
            .context("Failed to get library")?;
        let source_control = origin.map(|origin| LibrarySourceControlConfig {
            library_origin: GitRepoConfig {
                url: origin.url.clone(),
                reference: origin.reference.clone().unwrap_or_default(),
                commit: origin.commit.clone().unwrap_or_default(),
                path: origin.path.clone().unwrap_or_default(),
                credentials: if credentials_synced {
                    library_secret_id(id)
                } else {
                    String::new()
                },
            },
        });
        let up_to_date = current.as_ref().is_some_and(|c| {
            c.description == library.spec.description && c.source_control == source_control
        });
        if up_to_date {
            debug!(library.id = id, "Library up to date");
        } else {
            info!("🔄 Upserting library {} in DAS", id);
            let desired = LibraryConfig {
                id: id.to_string(),
                description: library.spec.description.clone(),
                read_only: self.config.read_only,
                source_control,
                datasources: current.as_ref().map(|c| c.datasources.clone()).unwrap_or_default(),
            };
            self.das
                .upsert_library(id, &desired)
                .await
                .context("Failed to upsert library")?;
        }

        self.reconcile_subjects("libraries", id, &library.spec.subjects)
            .await
            .context("Failed to sync library subjects")?;

        let declared: BTreeMap<String, String> = library
            .spec
            .datasources
            .iter()
            .map(|d| (library_datasource_id(id, &d.path), d.description.clone()))
            .collect();
        let observed = match &current {
            Some(current) => Some(
                self.observe_datasources(&current.datasources, &declared)
                    .await
                    .context("Failed to read library datasources")?,
            ),
            None => None,
        };
        let actions = diff(&declared, observed.as_ref(), &self.ignore_patterns);
        self.apply_datasource_actions(DatasourceOwner::Library(id), &actions)
            .await
            .context("Failed to sync library datasources")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        assert_eq!(library_secret_id("shared"), "libraries/shared/git");
        assert_eq!(library_datasource_id("shared", "data/users"), "libraries/shared/data/users");
    }
}
