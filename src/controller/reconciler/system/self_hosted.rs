//! # Self-Hosted Control Plane Pipeline
//!
//! Drives a System against the self-hosted OPA control plane: every declared
//! datasource becomes a source, the System's own source requires them plus
//! the configured defaults, and a bundle built from it is written to object
//! storage where the sidecar downloads it with its own read-only credentials.

use super::phases::{Phase, PipelineState, SELF_HOSTED_PHASES};
use crate::cluster::DerivedKind;
use crate::constants::{OPA_CONFIG_KEY, S3_ACCESS_KEY_ID, S3_REGION, S3_SECRET_ACCESS_KEY};
use crate::controller::reconciler::derived::{ensure_owned, render_yaml, single_entry};
use crate::controller::reconciler::error::ReconcileError;
use crate::controller::reconciler::s3_credentials::StorageCredentials;
use crate::controller::reconciler::sidecar::{
    opa_config_map_name, s3_credentials_secret_name, s3_opa_config, BundleLocation,
};
use crate::controller::reconciler::types::{ControlPlaneHandles, Reconciler};
use crate::controller::reconciler::validation::validate_url;
use crate::crd::System;
use crate::provider::ocp::{Bundle, ObjectStorage, Requirement, S3Location, Source, SourceGit};
use crate::provider::ClientError;
use anyhow::{Context, Result};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Object key of a System's bundle
pub fn bundle_key(unique_name: &str) -> String {
    format!("bundles/{unique_name}/bundle.tar.gz")
}

/// Source name of a declared datasource
pub fn datasource_source_name(path: &str) -> String {
    path.trim_matches('/').to_string()
}

impl Reconciler {
    pub(super) async fn run_self_hosted(
        &self,
        handles: &ControlPlaneHandles,
        system: &System,
        state: &mut PipelineState,
    ) -> Result<(), ReconcileError> {
        let unique_name = system.unique_name(&self.config.system_prefix, &self.config.system_suffix);
        state.id.clone_from(&unique_name);
        let mut credentials: Option<StorageCredentials> = None;

        for &phase in SELF_HOSTED_PHASES {
            let result = match phase {
                Phase::Sources => self.sync_sources(handles, system, &unique_name).await,
                Phase::Bundle => self.sync_bundle(handles, &unique_name).await,
                Phase::S3Credentials => self
                    .provision_storage_credentials(handles.storage.as_ref(), system, &unique_name)
                    .await
                    .map(|c| credentials = Some(c)),
                Phase::OpaSecret => self.sync_s3_secret(system, credentials.as_ref()).await,
                Phase::OpaConfigMap => self.sync_s3_opa_config_map(system, &unique_name).await,
                _ => Ok(()),
            };
            state.record(phase, result)?;
        }
        Ok(())
    }

    async fn sync_sources(&self, handles: &ControlPlaneHandles, system: &System, unique_name: &str) -> Result<()> {
        if let Some(origin) = system.git_origin() {
            validate_url(&origin.url).context("Invalid source control origin")?;
        }
        let settings = &self.config.opa_control_plane;
        let mut requirements: Vec<Requirement> = settings
            .default_requirements
            .iter()
            .map(Requirement::source)
            .collect();

        for datasource in &system.spec.datasources {
            let name = datasource_source_name(&datasource.path);
            match handles.ocp.get_source(&name).await {
                Ok(_) => debug!(source = name.as_str(), "Datasource source exists"),
                Err(e) if e.is_not_found() => {
                    info!(source = name.as_str(), "Creating datasource source");
                    handles
                        .ocp
                        .put_source(&Source {
                            name: name.clone(),
                            ..Source::default()
                        })
                        .await
                        .context("Failed to create datasource source")?;
                    if let Err(e) = self
                        .notifier
                        .system_datasource_changed(unique_name, &name)
                        .await
                    {
                        warn!(source = name.as_str(), error = %e, "Datasource change notification failed");
                    }
                }
                Err(e) => return Err(e).context("Failed to get datasource source"),
            }
            requirements.push(Requirement::source(name));
        }

        let git = system.git_origin().map(|origin| SourceGit {
            repo: origin.url.clone(),
            reference: origin.reference.clone(),
            commit: origin.commit.clone(),
            paths: origin.path.iter().cloned().collect(),
        });
        handles
            .ocp
            .put_source(&Source {
                name: unique_name.to_string(),
                git,
                requirements,
            })
            .await
            .context("Failed to update system source")?;
        Ok(())
    }

    async fn sync_bundle(&self, handles: &ControlPlaneHandles, unique_name: &str) -> Result<()> {
        let settings = &self.config.opa_control_plane;
        handles
            .ocp
            .put_bundle(&Bundle {
                name: unique_name.to_string(),
                object_storage: ObjectStorage {
                    aws: S3Location {
                        bucket: settings.bucket_name.clone(),
                        key: bundle_key(unique_name),
                        region: settings.bucket_region.clone(),
                        url: settings.bucket_url.clone(),
                    },
                },
                requirements: vec![Requirement::source(unique_name)],
            })
            .await
            .context("Failed to update bundle")?;
        Ok(())
    }

    async fn sync_s3_secret(&self, system: &System, credentials: Option<&StorageCredentials>) -> Result<()> {
        let credentials = credentials.context("Storage credentials not available")?;
        let data = BTreeMap::from([
            (S3_ACCESS_KEY_ID.to_string(), credentials.access_key.clone().into_bytes()),
            (S3_SECRET_ACCESS_KEY.to_string(), credentials.secret_key.clone().into_bytes()),
            (
                S3_REGION.to_string(),
                self.config.opa_control_plane.bucket_region.clone().into_bytes(),
            ),
        ]);
        ensure_owned(
            self.cluster.as_ref(),
            system,
            DerivedKind::Secret,
            &s3_credentials_secret_name(&system.name_any()),
            data,
        )
        .await?;
        Ok(())
    }

    async fn sync_s3_opa_config_map(&self, system: &System, unique_name: &str) -> Result<()> {
        let settings = &self.config.opa_control_plane;
        let key = bundle_key(unique_name);
        let location = BundleLocation {
            bucket_url: &settings.bucket_url,
            bucket: &settings.bucket_name,
            region: &settings.bucket_region,
            key: &key,
        };
        let config = s3_opa_config(
            unique_name,
            &location,
            settings.decision_logs_url.as_deref(),
            system.spec.custom_opa_config.as_ref(),
        );
        ensure_owned(
            self.cluster.as_ref(),
            system,
            DerivedKind::ConfigMap,
            &opa_config_map_name(&system.name_any()),
            single_entry(OPA_CONFIG_KEY, render_yaml(&config)?),
        )
        .await?;
        Ok(())
    }

    /// Remove the System's bundle and sources from the control plane
    ///
    /// Missing objects are fine, and so is a source that is still referenced
    /// by another System (the plane answers 500).
    pub(super) async fn teardown_self_hosted(
        &self,
        handles: &ControlPlaneHandles,
        system: &System,
    ) -> Result<()> {
        let unique_name = system.unique_name(&self.config.system_prefix, &self.config.system_suffix);
        tolerate_teardown(handles.ocp.delete_bundle(&unique_name).await, "bundle", &unique_name)?;
        tolerate_teardown(handles.ocp.delete_source(&unique_name).await, "source", &unique_name)?;
        for datasource in &system.spec.datasources {
            let name = datasource_source_name(&datasource.path);
            tolerate_teardown(handles.ocp.delete_source(&name).await, "source", &name)?;
        }
        Ok(())
    }
}

fn tolerate_teardown(result: Result<(), ClientError>, what: &str, name: &str) -> Result<()> {
    match result {
        Ok(()) => {
            info!("🗑️ Deleted {} {}", what, name);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!("{} {} already gone", what, name);
            Ok(())
        }
        Err(e) if e.is_server_error() => {
            warn!("{} {} not deleted, still in use: {}", what, name, e);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to delete {what} {name}")),
    }
}
