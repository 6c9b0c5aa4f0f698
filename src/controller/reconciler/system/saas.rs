//! # DAS Pipeline
//!
//! Drives a System against DAS: resolve or create the external system, then
//! sync credentials, subjects, datasources and the system spec, and finally
//! generate the sidecar token Secret and configuration ConfigMaps.

use super::phases::{Phase, PipelineState, SAAS_PHASES};
use crate::cluster::{DerivedKind, EventRecord};
use crate::constants::{OPA_CONFIG_KEY, OPA_TOKEN_KEY, SLP_CONFIG_KEY};
use crate::controller::reconciler::credentials::resolve_git_auth;
use crate::controller::reconciler::datasources::{diff, DatasourceOwner};
use crate::controller::reconciler::derived::{ensure_owned, render_yaml, single_entry};
use crate::controller::reconciler::error::{EventReason, ReconcileError};
use crate::controller::reconciler::sidecar::{
    das_opa_config, opa_config_map_name, opa_token_secret_name, slp_config, slp_config_map_name,
};
use crate::controller::reconciler::types::Reconciler;
use crate::controller::reconciler::validation::{decision_mappings_equal, validate_url};
use crate::crd::{DecisionMapping, ExpectedValue, System};
use crate::provider::das::{
    AllowedMappingConfig, BundleDownloadConfig, ColumnMappingConfig, DecisionMappingConfig,
    GitRepoConfig, OpaConfig, ReasonMappingConfig, SourceControlConfig, SystemConfig,
    SystemRequest,
};
use anyhow::{Context, Result};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Type of systems created by the controller
const SYSTEM_TYPE_CUSTOM: &str = "custom";

/// Policies DAS creates with every new system
const DEFAULT_POLICY_STUBS: &[&str] = &["rules", "test"];

/// Values carried between phases of one reconcile
#[derive(Debug, Default)]
struct SaasRun {
    display_name: String,
    /// The external system was created during this reconcile
    created: bool,
    remote: Option<SystemConfig>,
    credentials_synced: bool,
    opa: Option<OpaConfig>,
}

pub fn system_secret_id(system_id: &str) -> String {
    format!("systems/{system_id}/git")
}

pub fn system_datasource_id(system_id: &str, path: &str) -> String {
    format!("systems/{system_id}/{}", path.trim_matches('/'))
}

fn expected_value(expected: &ExpectedValue) -> Option<serde_json::Value> {
    if let Some(b) = expected.boolean {
        Some(serde_json::Value::Bool(b))
    } else if let Some(s) = &expected.string {
        Some(serde_json::Value::String(s.clone()))
    } else {
        expected.integer.map(serde_json::Value::from)
    }
}

/// Decision mappings in the shape DAS stores them, keyed by name
pub fn decision_mappings(mappings: &[DecisionMapping]) -> BTreeMap<String, DecisionMappingConfig> {
    mappings
        .iter()
        .map(|m| {
            let config = DecisionMappingConfig {
                allowed: m.allowed.as_ref().map(|a| AllowedMappingConfig {
                    path: a.path.clone(),
                    expected: a.expected.as_ref().and_then(expected_value),
                    negated: a.negated,
                }),
                reason: m.reason.as_ref().map(|r| ReasonMappingConfig {
                    path: r.path.clone(),
                }),
                columns: m
                    .columns
                    .iter()
                    .map(|c| ColumnMappingConfig {
                        key: c.key.clone(),
                        path: c.path.clone(),
                        type_: c.type_.clone().unwrap_or_default(),
                    })
                    .collect(),
            };
            (m.name.clone(), config)
        })
        .collect()
}

impl Reconciler {
    pub(super) async fn run_saas(
        &self,
        system: &System,
        state: &mut PipelineState,
    ) -> Result<(), ReconcileError> {
        let mut run = SaasRun {
            display_name: system.display_name(&self.config.system_prefix, &self.config.system_suffix),
            ..SaasRun::default()
        };
        for &phase in SAAS_PHASES {
            if phase == Phase::SlpConfigMap && system.spec.local_plane.is_none() {
                continue;
            }
            let result = match phase {
                Phase::CreatedInDas => self.ensure_das_system(system, state, &mut run).await,
                Phase::GitCredentials => self.sync_system_credentials(system, &state.id, &mut run).await,
                Phase::Subjects => self
                    .reconcile_subjects("systems", &state.id, &system.spec.subjects)
                    .await
                    .context("Failed to sync subjects"),
                Phase::Datasources => self.sync_system_datasources(system, &state.id, &run).await,
                Phase::SystemConfig => self.update_system_config(system, &state.id, &run).await,
                Phase::OpaToken => self.sync_opa_token(system, &state.id, &mut run).await,
                Phase::OpaConfigMap => self.sync_opa_config_map(system, &run).await,
                Phase::SlpConfigMap => self.sync_slp_config_map(system, &run).await,
                _ => Ok(()),
            };
            state.record(phase, result)?;
        }
        Ok(())
    }

    fn create_request(&self, display_name: &str) -> SystemRequest {
        SystemRequest {
            name: display_name.to_string(),
            description: String::new(),
            type_: SYSTEM_TYPE_CUSTOM.to_string(),
            read_only: self.config.read_only,
            ..SystemRequest::default()
        }
    }

    /// Resolve the external system, creating it when it doesn't exist
    ///
    /// Identity comes from, in order: the migration annotation (when enabled
    /// and no ID is recorded yet), the recorded ID, a lookup by display name.
    async fn ensure_das_system(
        &self,
        system: &System,
        state: &mut PipelineState,
        run: &mut SaasRun,
    ) -> Result<()> {
        let known_id = match (system.status_id(), system.migration_id()) {
            (None, Some(migration_id)) if self.config.enable_migrations => {
                info!(system.id = migration_id, "Adopting system from migration annotation");
                Some(migration_id)
            }
            (status_id, _) => status_id,
        };
        let request = self.create_request(&run.display_name);

        let Some(id) = known_id else {
            if let Some(existing) = self.das.get_system_by_name(&run.display_name).await? {
                info!(system.id = existing.id.as_str(), "Found existing system by name");
                state.id.clone_from(&existing.id);
                run.remote = Some(existing);
                return self.persist_status_id(system, &state.id).await;
            }
            let created = self
                .das
                .create_system(&request)
                .await
                .context("Failed to create system")?;
            return self.after_create(system, state, run, created).await;
        };

        match self.das.get_system(id).await {
            Ok(existing) => {
                state.id = id.to_string();
                run.remote = Some(existing);
                if system.status_id() != Some(id) {
                    self.persist_status_id(system, id).await?;
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(system.id = id, "System not found in DAS, recreating with the same ID");
                let created = match self.das.put_system(id, &request, true).await {
                    Ok(created) => created,
                    Err(e) if e.is_conflict() => {
                        warn!(system.id = id, "ID taken, creating system with a new ID");
                        self.das
                            .create_system(&request)
                            .await
                            .context("Failed to create system")?
                    }
                    Err(e) => return Err(e).context("Failed to recreate system"),
                };
                self.after_create(system, state, run, created).await
            }
            Err(e) => Err(e).context("Failed to get system"),
        }
    }

    async fn after_create(
        &self,
        system: &System,
        state: &mut PipelineState,
        run: &mut SaasRun,
        created: SystemConfig,
    ) -> Result<()> {
        info!("✅ Created system {} in DAS ({})", run.display_name, created.id);
        for stub in DEFAULT_POLICY_STUBS {
            let policy_id = format!("systems/{}/{stub}", created.id);
            match self.das.delete_policy(&policy_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!(policy.id = policy_id.as_str(), "Policy already gone"),
                Err(e) => return Err(e).context("Failed to delete default policy"),
            }
        }
        state.id.clone_from(&created.id);
        run.created = true;
        run.remote = Some(created);
        self.persist_status_id(system, &state.id).await?;

        let event = EventRecord::normal(
            EventReason::CreatedSystem.as_str(),
            "Create",
            format!("Created system {} in DAS", state.id),
        );
        if let Err(e) = self.cluster.publish_event(&system.object_ref(&()), &event).await {
            warn!(error = %e, "Failed to publish event");
        }
        Ok(())
    }

    async fn sync_system_credentials(&self, system: &System, id: &str, run: &mut SaasRun) -> Result<()> {
        let Some(origin) = system.git_origin() else {
            return Ok(());
        };
        validate_url(&origin.url).context("Invalid source control origin")?;
        let namespace = system.namespace().unwrap_or_default();
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
                .create_update_secret(&system_secret_id(id), &auth.user, &auth.password)
                .await
                .context("Failed to update git credentials")?;
            run.credentials_synced = true;
        }
        Ok(())
    }

    async fn sync_system_datasources(&self, system: &System, id: &str, run: &SaasRun) -> Result<()> {
        let declared: BTreeMap<String, String> = system
            .spec
            .datasources
            .iter()
            .map(|d| (system_datasource_id(id, &d.path), d.description.clone()))
            .collect();
        let observed = match (&run.remote, run.created) {
            (Some(remote), false) => Some(
                self.observe_datasources(&remote.datasources, &declared)
                    .await
                    .context("Failed to read datasources")?,
            ),
            _ => None,
        };
        let actions = diff(&declared, observed.as_ref(), &self.ignore_patterns);
        self.apply_datasource_actions(DatasourceOwner::System(id), &actions)
            .await
            .context("Failed to sync datasources")?;
        Ok(())
    }

    fn desired_request(&self, system: &System, id: &str, run: &SaasRun) -> SystemRequest {
        let source_control = system.git_origin().map(|origin| SourceControlConfig {
            origin: GitRepoConfig {
                url: origin.url.clone(),
                reference: origin.reference.clone().unwrap_or_default(),
                commit: origin.commit.clone().unwrap_or_default(),
                path: origin.path.clone().unwrap_or_default(),
                credentials: if run.credentials_synced {
                    system_secret_id(id)
                } else {
                    String::new()
                },
            },
        });
        let remote = run.remote.as_ref();
        SystemRequest {
            name: run.display_name.clone(),
            description: remote.map(|r| r.description.clone()).unwrap_or_default(),
            type_: remote
                .map(|r| r.type_.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| SYSTEM_TYPE_CUSTOM.to_string()),
            read_only: self.config.read_only,
            source_control,
            decision_mappings: decision_mappings(&system.spec.decision_mappings),
            bundle_download: Some(BundleDownloadConfig {
                delta_bundles: system.delta_bundles(),
            }),
        }
    }

    async fn update_system_config(&self, system: &System, id: &str, run: &SaasRun) -> Result<()> {
        let desired = self.desired_request(system, id, run);
        let up_to_date = run.remote.as_ref().is_some_and(|remote| {
            remote.name == desired.name
                && remote.read_only == desired.read_only
                && remote.bundle_download.as_ref().is_some_and(|b| b.delta_bundles)
                    == system.delta_bundles()
                && remote.source_control == desired.source_control
                && decision_mappings_equal(&remote.decision_mappings, &desired.decision_mappings)
        });
        if up_to_date {
            debug!(system.id = id, "System spec up to date");
            return Ok(());
        }
        info!("🔄 Updating system {} in DAS", id);
        self.das
            .update_system(id, &desired)
            .await
            .context("Failed to update system")?;
        Ok(())
    }

    async fn sync_opa_token(&self, system: &System, id: &str, run: &mut SaasRun) -> Result<()> {
        let opa = self
            .das
            .get_opa_config(id)
            .await
            .context("Failed to get OPA config")?;
        ensure_owned(
            self.cluster.as_ref(),
            system,
            DerivedKind::Secret,
            &opa_token_secret_name(&system.name_any()),
            single_entry(OPA_TOKEN_KEY, opa.token.clone()),
        )
        .await?;
        run.opa = Some(opa);
        Ok(())
    }

    async fn sync_opa_config_map(&self, system: &System, run: &SaasRun) -> Result<()> {
        let opa = run.opa.as_ref().context("OPA token not available")?;
        let config = das_opa_config(
            opa,
            system.spec.local_plane.as_ref().map(|lp| lp.name.as_str()),
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

    async fn sync_slp_config_map(&self, system: &System, run: &SaasRun) -> Result<()> {
        let opa = run.opa.as_ref().context("OPA token not available")?;
        ensure_owned(
            self.cluster.as_ref(),
            system,
            DerivedKind::ConfigMap,
            &slp_config_map_name(&system.name_any()),
            single_entry(SLP_CONFIG_KEY, render_yaml(&slp_config(opa))?),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AllowedMapping, ColumnMapping};

    #[test]
    fn test_ids() {
        assert_eq!(system_secret_id("abc"), "systems/abc/git");
        assert_eq!(system_datasource_id("abc", "kubernetes/resources"), "systems/abc/kubernetes/resources");
        assert_eq!(system_datasource_id("abc", "/data/"), "systems/abc/data");
    }

    #[test]
    fn test_decision_mappings_conversion() {
        let mappings = vec![DecisionMapping {
            name: "authz".to_string(),
            allowed: Some(AllowedMapping {
                path: "result.allowed".to_string(),
                expected: Some(ExpectedValue {
                    integer: Some(1),
                    ..ExpectedValue::default()
                }),
                negated: true,
            }),
            reason: None,
            columns: vec![ColumnMapping {
                key: "user".to_string(),
                path: "input.user".to_string(),
                type_: None,
            }],
        }];
        let converted = decision_mappings(&mappings);
        let authz = &converted["authz"];
        let allowed = authz.allowed.as_ref().unwrap();
        assert_eq!(allowed.expected, Some(serde_json::json!(1)));
        assert!(allowed.negated);
        assert_eq!(authz.columns[0].type_, "");
    }

    #[test]
    fn test_expected_value_prefers_boolean() {
        let expected = ExpectedValue {
            boolean: Some(false),
            string: Some("x".to_string()),
            integer: None,
        };
        assert_eq!(expected_value(&expected), Some(serde_json::json!(false)));
        assert_eq!(expected_value(&ExpectedValue::default()), None);
    }
}
