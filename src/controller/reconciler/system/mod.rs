//! # System Reconciliation
//!
//! State machine of a `System`:
//!
//! 1. Re-read the resource; a vanished System only clears its metrics
//! 2. Skip resources of another controller class
//! 3. Deletion: external teardown (unless deletion-protected), then release
//!    the finalizer. Without our finalizer deletion is a no-op.
//! 4. Ensure the finalizer
//! 5. Run the phase pipeline of the selected control plane, stopping at the
//!    first failure
//! 6. Write status (phase, ready, failure message, conditions) when it changed
//!
//! Both control planes share this flow; they only differ in the phase list.

mod phases;
mod saas;
mod self_hosted;

pub use phases::{Phase, SAAS_PHASES, SELF_HOSTED_PHASES};
pub use saas::{decision_mappings, system_datasource_id, system_secret_id};
pub use self_hosted::{bundle_key, datasource_source_name};

use super::conditions::Conditions;
use super::error::{EventReason, ReconcileError};
use super::types::{resource_key, Reconciler, ReconcilerError};
use crate::cluster::EventRecord;
use crate::crd::{class_matches, ControlPlane, System, SystemPhase, SystemStatus};
use crate::observability::metrics;
use anyhow::{Context, Result};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use phases::PipelineState;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

const KIND: &str = "System";

/// Reconcile one System
///
/// Errors are returned to the controller's error policy, which requeues with
/// backoff. Status, Conditions and Events have been recorded by then.
pub async fn reconcile_system(obj: Arc<System>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let span = info_span!(
        "reconcile",
        resource.kind = KIND,
        system.namespace = namespace.as_str(),
        system.name = name.as_str()
    );
    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(KIND);
        info!("🔄 Reconciling System {}/{}", namespace, name);

        let result = ctx.reconcile_system_inner(&namespace, &name).await;
        metrics::observe_reconciliation_duration(KIND, start.elapsed().as_secs_f64());

        match &result {
            Ok(_) => {
                let key = resource_key(KIND, Some(&namespace), &name);
                if ctx.reset_backoff(&key) {
                    info!("✅ System {}/{} recovered after previous failures", namespace, name);
                }
                info!(
                    "✅ Reconciliation complete for System {}/{} (duration: {:.2}s)",
                    namespace,
                    name,
                    start.elapsed().as_secs_f64()
                );
            }
            Err(e) => {
                metrics::increment_reconciliation_errors(KIND);
                error!("❌ Reconciliation failed for System {}/{}: {}", namespace, name, e);
            }
        }
        result
    }
    .instrument(span)
    .await
}

impl Reconciler {
    async fn reconcile_system_inner(&self, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
        let Some(system) = self.cluster.get_system(namespace, name).await? else {
            debug!("System {}/{} not found, clearing metrics", namespace, name);
            metrics::clear_system_ready(namespace, name);
            return Ok(Action::await_change());
        };

        if !class_matches(&system, &self.config.controller_class) {
            debug!("System {}/{} belongs to another controller class", namespace, name);
            return Ok(Action::await_change());
        }

        if system.metadata.deletion_timestamp.is_some() {
            if !system.has_finalizer() {
                return Ok(Action::await_change());
            }
            self.delete_system(&system).await?;
            metrics::clear_system_ready(namespace, name);
            return Ok(Action::await_change());
        }

        if !system.has_finalizer() {
            self.cluster.add_finalizer(&system).await?;
        }

        let control_plane = system.control_plane();
        let mut state = PipelineState::new(
            system.status_id().unwrap_or_default().to_string(),
            Conditions::from_status(
                system
                    .status
                    .as_ref()
                    .map(|s| s.conditions.as_slice())
                    .unwrap_or_default(),
            ),
            chrono::Utc::now().to_rfc3339(),
        );

        let outcome = match control_plane {
            ControlPlane::Das => self.run_saas(&system, &mut state).await,
            ControlPlane::OpaControlPlane => {
                let handles = match &self.control_plane {
                    Some(handles) if self.config.opa_control_plane.enabled => handles,
                    _ => {
                        warn!(
                            "System {}/{} selects the self-hosted control plane, which is not enabled",
                            namespace, name
                        );
                        return Ok(Action::await_change());
                    }
                };
                self.run_self_hosted(handles, &system, &mut state).await
            }
        };

        // Reported first so the Event survives a failing status write
        if let Err(e) = &outcome {
            self.report_failure(&system, e).await;
        }
        metrics::set_system_ready(namespace, name, control_plane.as_str(), outcome.is_ok());
        self.write_status(&system, state, outcome.as_ref().err()).await?;

        match outcome {
            Ok(()) => Ok(Action::requeue(self.config.resync_interval())),
            Err(e) => Err(e.into()),
        }
    }

    /// Two-phase delete: external teardown, then release the finalizer
    async fn delete_system(&self, system: &System) -> Result<(), ReconcilerError> {
        let name = system.name_any();
        if system.deletion_protected(self.config.deletion_protection_default) {
            info!("System {} is deletion-protected, keeping external state", name);
        } else {
            let teardown = match system.control_plane() {
                ControlPlane::Das => self.teardown_das(system).await,
                ControlPlane::OpaControlPlane => match &self.control_plane {
                    Some(handles) => self.teardown_self_hosted(handles, system).await,
                    None => {
                        warn!("Self-hosted control plane not configured, nothing to tear down for {}", name);
                        Ok(())
                    }
                },
            };
            if let Err(cause) = teardown {
                let e = ReconcileError::new(cause).with_event(EventReason::FailedDelete);
                self.report_failure(system, &e).await;
                return Err(e.into());
            }
        }
        self.cluster.remove_finalizer(system).await?;
        info!("✅ Released finalizer of System {}", name);
        Ok(())
    }

    async fn teardown_das(&self, system: &System) -> Result<()> {
        let Some(id) = system.status_id() else {
            debug!("System {} was never created in DAS", system.name_any());
            return Ok(());
        };
        match self.das.delete_system(id).await {
            Ok(()) => {
                info!("🗑️ Deleted system {} from DAS", id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("System {} already deleted from DAS", id);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to delete system"),
        }
    }

    /// Record the external ID right away, so a failure in a later phase
    /// doesn't lead to a duplicate system on the next reconcile
    pub(super) async fn persist_status_id(&self, system: &System, id: &str) -> Result<()> {
        let mut status = system.status.clone().unwrap_or_default();
        if status.id == id {
            return Ok(());
        }
        status.id = id.to_string();
        self.cluster
            .patch_system_status(system, &status)
            .await
            .context("Failed to record system ID")
    }

    async fn write_status(
        &self,
        system: &System,
        state: PipelineState,
        failure: Option<&ReconcileError>,
    ) -> Result<(), ReconcilerError> {
        let previous = system.status.clone().unwrap_or_default();
        let status = SystemStatus {
            id: state.id,
            ready: failure.is_none(),
            phase: if failure.is_none() {
                SystemPhase::Created
            } else {
                SystemPhase::Failed
            },
            failure_message: failure.map(ToString::to_string),
            conditions: state.conditions.into_vec(),
            observed_generation: system.metadata.generation,
        };
        if status == previous {
            debug!("Status of System {} unchanged, skipping update", system.name_any());
            return Ok(());
        }
        self.cluster.patch_system_status(system, &status).await?;
        Ok(())
    }

    /// Publish the failure as an Event and count it unless the author has to fix it
    async fn report_failure(&self, system: &System, e: &ReconcileError) {
        if e.is_user_error() {
            warn!("System {} needs attention: {}", system.name_any(), e);
        } else {
            metrics::increment_reported_errors();
        }
        if let Some(reason) = e.event() {
            let event = EventRecord::warning(reason.as_str(), "Reconcile", e.to_string());
            if let Err(publish_error) = self.cluster.publish_event(&system.object_ref(&()), &event).await {
                warn!("Failed to publish event: {}", publish_error);
            }
        }
    }
}
