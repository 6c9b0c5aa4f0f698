//! # Cluster Access
//!
//! Everything the reconcilers read from or write to the Kubernetes API goes
//! through [`ClusterApi`], implemented by [`KubeCluster`] on a real cluster and
//! by in-memory fakes in tests.

mod client;

pub use client::KubeCluster;

use crate::crd::{GlobalDatasource, Library, System, SystemStatus};
use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;

/// Kind of object generated on behalf of a System
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivedKind {
    Secret,
    ConfigMap,
}

impl DerivedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedKind::Secret => "Secret",
            DerivedKind::ConfigMap => "ConfigMap",
        }
    }
}

/// The parts of a Secret or ConfigMap the controller manages
///
/// ConfigMap values are UTF-8; they are kept as bytes here so both kinds
/// compare the same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedObject {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
    pub data: BTreeMap<String, Vec<u8>>,
    pub resource_version: Option<String>,
}

impl DerivedObject {
    /// True when any owner reference points at the object with `uid`
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_references.iter().any(|r| r.uid == uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

/// A Kubernetes Event about one of our resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub kind: EventKind,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

impl EventRecord {
    pub fn warning(reason: &str, action: &str, note: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Warning,
            reason: reason.to_string(),
            action: action.to_string(),
            note: Some(note.into()),
        }
    }

    pub fn normal(reason: &str, action: &str, note: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Normal,
            reason: reason.to_string(),
            action: action.to_string(),
            note: Some(note.into()),
        }
    }
}

#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_system(&self, namespace: &str, name: &str) -> Result<Option<System>>;
    /// Replace the status subresource of `system`
    async fn patch_system_status(&self, system: &System, status: &SystemStatus) -> Result<()>;
    async fn add_finalizer(&self, system: &System) -> Result<()>;
    async fn remove_finalizer(&self, system: &System) -> Result<()>;

    async fn get_library(&self, namespace: &str, name: &str) -> Result<Option<Library>>;
    async fn get_global_datasource(&self, name: &str) -> Result<Option<GlobalDatasource>>;

    /// Data of a user-provided Secret, e.g. git credentials
    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>>;

    async fn get_derived(
        &self,
        kind: DerivedKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DerivedObject>>;
    async fn create_derived(&self, kind: DerivedKind, object: &DerivedObject) -> Result<()>;
    async fn update_derived(&self, kind: DerivedKind, object: &DerivedObject) -> Result<()>;

    async fn publish_event(&self, reference: &ObjectReference, event: &EventRecord) -> Result<()>;
}
