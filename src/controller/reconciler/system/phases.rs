//! # System Phases
//!
//! The ordered phases of each control plane. Every phase owns one Condition
//! and the Event reason published when it fails. The pipeline stops at the
//! first failing phase; conditions of earlier phases stay recorded.

use crate::controller::reconciler::conditions::{ConditionType, Conditions};
use crate::controller::reconciler::error::{EventReason, ReconcileError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CreatedInDas,
    GitCredentials,
    Subjects,
    Datasources,
    SystemConfig,
    OpaToken,
    OpaConfigMap,
    SlpConfigMap,
    Sources,
    Bundle,
    S3Credentials,
    OpaSecret,
}

/// Phases against DAS, in execution order
pub const SAAS_PHASES: &[Phase] = &[
    Phase::CreatedInDas,
    Phase::GitCredentials,
    Phase::Subjects,
    Phase::Datasources,
    Phase::SystemConfig,
    // The token is a precondition for the configmaps
    Phase::OpaToken,
    Phase::OpaConfigMap,
    Phase::SlpConfigMap,
];

/// Phases against the self-hosted control plane, in execution order
pub const SELF_HOSTED_PHASES: &[Phase] = &[
    Phase::Sources,
    Phase::Bundle,
    Phase::S3Credentials,
    Phase::OpaSecret,
    Phase::OpaConfigMap,
];

impl Phase {
    pub fn condition(self) -> ConditionType {
        match self {
            Phase::CreatedInDas => ConditionType::CreatedInDas,
            Phase::GitCredentials => ConditionType::GitCredentialsUpdated,
            Phase::Subjects => ConditionType::SubjectsUpdated,
            Phase::Datasources => ConditionType::DatasourcesUpdated,
            Phase::SystemConfig => ConditionType::SystemConfigUpdated,
            Phase::OpaToken => ConditionType::OpaTokenUpdated,
            Phase::OpaConfigMap => ConditionType::OpaConfigMapUpdated,
            Phase::SlpConfigMap => ConditionType::SlpConfigMapUpdated,
            Phase::Sources => ConditionType::SourcesUpdated,
            Phase::Bundle => ConditionType::BundleUpdated,
            Phase::S3Credentials => ConditionType::S3CredentialsUpdated,
            Phase::OpaSecret => ConditionType::OpaSecretUpdated,
        }
    }

    pub fn event(self) -> EventReason {
        match self {
            Phase::CreatedInDas => EventReason::FailedCreateSystem,
            Phase::GitCredentials => EventReason::FailedSyncCredentials,
            Phase::Subjects => EventReason::FailedSyncSubjects,
            Phase::Datasources => EventReason::FailedSyncDatasources,
            Phase::SystemConfig => EventReason::FailedUpdateSystem,
            Phase::OpaToken => EventReason::FailedSyncToken,
            Phase::OpaConfigMap | Phase::SlpConfigMap => EventReason::FailedSyncConfigMap,
            Phase::Sources => EventReason::FailedSyncSources,
            Phase::Bundle => EventReason::FailedSyncBundle,
            Phase::S3Credentials => EventReason::FailedProvisionStorage,
            Phase::OpaSecret => EventReason::FailedSyncSecret,
        }
    }
}

/// Outcome of the phases run so far
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// External system ID, empty until resolved
    pub id: String,
    pub conditions: Conditions,
    now: String,
}

impl PipelineState {
    pub fn new(id: String, conditions: Conditions, now: String) -> Self {
        Self { id, conditions, now }
    }

    /// Record the result of `phase`, turning a failure into a [`ReconcileError`]
    /// carrying the phase's condition and event
    pub fn record(&mut self, phase: Phase, result: anyhow::Result<()>) -> Result<(), ReconcileError> {
        match result {
            Ok(()) => {
                debug!(phase = phase.condition().as_str(), "Phase succeeded");
                self.conditions = self.conditions.set(phase.condition(), true, None, &self.now);
                Ok(())
            }
            Err(cause) => {
                let message = format!("{cause:#}");
                warn!(phase = phase.condition().as_str(), error = %message, "Phase failed");
                self.conditions =
                    self.conditions
                        .set(phase.condition(), false, Some(&message), &self.now);
                Err(ReconcileError::new(cause)
                    .with_condition(phase.condition())
                    .with_event(phase.event()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_map_to_distinct_conditions() {
        for phases in [SAAS_PHASES, SELF_HOSTED_PHASES] {
            let mut conditions: Vec<_> = phases.iter().map(|p| p.condition()).collect();
            conditions.sort();
            conditions.dedup();
            assert_eq!(conditions.len(), phases.len());
        }
    }

    #[test]
    fn test_token_precedes_configmaps() {
        let position = |phase| SAAS_PHASES.iter().position(|p| *p == phase).unwrap();
        assert!(position(Phase::OpaToken) < position(Phase::OpaConfigMap));
        assert!(position(Phase::OpaToken) < position(Phase::SlpConfigMap));
        assert_eq!(SAAS_PHASES[0], Phase::CreatedInDas);
    }

    #[test]
    fn test_record_failure_keeps_earlier_conditions() {
        let mut state = PipelineState::new(String::new(), Conditions::default(), "t1".to_string());
        state.record(Phase::CreatedInDas, Ok(())).unwrap();
        let err = state
            .record(Phase::Subjects, Err(anyhow::anyhow!("boom")))
            .unwrap_err();
        assert_eq!(err.condition(), Some(ConditionType::SubjectsUpdated));
        assert_eq!(err.event(), Some(EventReason::FailedSyncSubjects));
        assert_eq!(state.conditions.get(ConditionType::CreatedInDas), Some(true));
        assert_eq!(state.conditions.get(ConditionType::SubjectsUpdated), Some(false));
    }
}
