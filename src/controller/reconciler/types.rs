//! # Reconciler Types
//!
//! [`Reconciler`] is the context shared by every reconcile. It carries the
//! capability handles (cluster, DAS, self-hosted plane, object storage,
//! webhooks), the controller configuration and per-resource backoff state.

use super::error::ReconcileError;
use super::user_cache::UserCache;
use crate::cluster::ClusterApi;
use crate::config::SharedControllerConfig;
use crate::constants::{DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS};
use crate::controller::backoff::FibonacciBackoff;
use crate::provider::das::DasApi;
use crate::provider::ocp::ControlPlaneApi;
use crate::provider::s3::ObjectStorageAdmin;
use crate::provider::webhook::Notifier;
use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("{0}")]
    Reconcile(#[from] ReconcileError),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(DEFAULT_BACKOFF_MIN_SECS, DEFAULT_BACKOFF_MAX_SECS),
            error_count: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying
    pub fn next_retry(&mut self) -> Duration {
        self.error_count += 1;
        self.backoff.next_backoff()
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// Self-hosted control plane handles, present when the plane is enabled
#[derive(Clone)]
pub struct ControlPlaneHandles {
    pub ocp: Arc<dyn ControlPlaneApi>,
    pub storage: Arc<dyn ObjectStorageAdmin>,
}

pub struct Reconciler {
    pub(crate) cluster: Arc<dyn ClusterApi>,
    pub(crate) das: Arc<dyn DasApi>,
    pub(crate) control_plane: Option<ControlPlaneHandles>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: SharedControllerConfig,
    pub(crate) user_cache: UserCache,
    pub(crate) ignore_patterns: Vec<Regex>,
    // Backoff state per resource (identified by kind/namespace/name)
    pub(crate) backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    /// Build a reconciler against DAS only
    ///
    /// # Errors
    ///
    /// Fails when the configured datasource ignore patterns don't compile.
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        das: Arc<dyn DasApi>,
        notifier: Arc<dyn Notifier>,
        config: SharedControllerConfig,
    ) -> Result<Self> {
        let ignore_patterns = config.ignore_patterns()?;
        Ok(Self {
            cluster,
            das,
            control_plane: None,
            notifier,
            user_cache: UserCache::new(config.user_cache_ttl()),
            config,
            ignore_patterns,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Enable reconciliation against the self-hosted control plane
    #[must_use]
    pub fn with_control_plane(
        mut self,
        ocp: Arc<dyn ControlPlaneApi>,
        storage: Arc<dyn ObjectStorageAdmin>,
    ) -> Self {
        self.control_plane = Some(ControlPlaneHandles { ocp, storage });
        self
    }

    pub fn config(&self) -> &SharedControllerConfig {
        &self.config
    }

    /// Reset the backoff of `key` after a successful reconcile.
    /// Returns true when the resource had been failing.
    pub(crate) fn reset_backoff(&self, key: &str) -> bool {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match states.get_mut(key) {
            Some(state) => {
                let had_errors = state.error_count > 0;
                state.reset();
                had_errors
            }
            None => false,
        }
    }

    /// Advance the backoff of `key` after a failed reconcile
    pub(crate) fn next_retry(&self, key: &str) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(key.to_string()).or_default();
        let delay = state.next_retry();
        (delay, state.error_count)
    }
}

/// Key identifying a resource in the backoff map
pub(crate) fn resource_key(kind: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) => format!("{kind}/{namespace}/{name}"),
        None => format!("{kind}/{name}"),
    }
}
