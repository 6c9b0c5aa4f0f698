//! # Reconcile Errors
//!
//! [`ReconcileError`] is the only error type the state machine constructs. It
//! wraps any cause together with the Event to publish and the Condition to
//! set false, so the caller can record the failure uniformly.

use super::conditions::ConditionType;
use crate::provider::ClientError;
use thiserror::Error;

/// Reasons of the Events published on our resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventReason {
    CreatedSystem,
    FailedCreateSystem,
    FailedSyncCredentials,
    FailedSyncSubjects,
    FailedSyncDatasources,
    FailedUpdateSystem,
    FailedSyncToken,
    FailedSyncConfigMap,
    FailedSyncSources,
    FailedSyncBundle,
    FailedProvisionStorage,
    FailedSyncSecret,
    FailedDelete,
    FailedSyncLibrary,
    FailedSyncGlobalDatasource,
}

impl EventReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventReason::CreatedSystem => "CreatedSystem",
            EventReason::FailedCreateSystem => "FailedCreateSystem",
            EventReason::FailedSyncCredentials => "FailedSyncCredentials",
            EventReason::FailedSyncSubjects => "FailedSyncSubjects",
            EventReason::FailedSyncDatasources => "FailedSyncDatasources",
            EventReason::FailedUpdateSystem => "FailedUpdateSystem",
            EventReason::FailedSyncToken => "FailedSyncToken",
            EventReason::FailedSyncConfigMap => "FailedSyncConfigMap",
            EventReason::FailedSyncSources => "FailedSyncSources",
            EventReason::FailedSyncBundle => "FailedSyncBundle",
            EventReason::FailedProvisionStorage => "FailedProvisionStorage",
            EventReason::FailedSyncSecret => "FailedSyncSecret",
            EventReason::FailedDelete => "FailedDelete",
            EventReason::FailedSyncLibrary => "FailedSyncLibrary",
            EventReason::FailedSyncGlobalDatasource => "FailedSyncGlobalDatasource",
        }
    }
}

#[derive(Debug, Error)]
#[error("{cause:#}")]
pub struct ReconcileError {
    cause: anyhow::Error,
    event: Option<EventReason>,
    condition: Option<ConditionType>,
}

impl ReconcileError {
    pub fn new(cause: impl Into<anyhow::Error>) -> Self {
        Self {
            cause: cause.into(),
            event: None,
            condition: None,
        }
    }

    #[must_use]
    pub fn with_event(mut self, event: EventReason) -> Self {
        self.event = Some(event);
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: ConditionType) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn event(&self) -> Option<EventReason> {
        self.event
    }

    pub fn condition(&self) -> Option<ConditionType> {
        self.condition
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Caused by the resource's author rather than by the controller
    pub fn is_user_error(&self) -> bool {
        is_user_error(&self.to_string())
    }
}

impl From<anyhow::Error> for ReconcileError {
    fn from(cause: anyhow::Error) -> Self {
        Self::new(cause)
    }
}

impl From<ClientError> for ReconcileError {
    fn from(cause: ClientError) -> Self {
        Self::new(cause)
    }
}

/// Message fragments of failures the resource's author has to fix
const USER_ERROR_MESSAGES: &[&str] = &[
    "same git repository",
    "could not find credentials Secret",
];

/// True when `message` describes a known user-caused failure. Those are
/// logged and surfaced on the resource but not counted as reported errors.
pub fn is_user_error(message: &str) -> bool {
    USER_ERROR_MESSAGES.iter().any(|m| message.contains(m))
}
