//! # DAS API
//!
//! Capability traits over the hosted policy-administration API and the
//! reqwest-backed [`DasClient`] implementing them.
//!
//! Lookups that are routinely empty return `Option`. [`SystemOps::get_system`]
//! is the exception: a missing system is an `Http` 404 because the caller
//! branches on it to recreate the system with its preserved ID.

mod client;
mod types;

pub use client::DasClient;
pub use types::*;

use super::ClientResult;
use async_trait::async_trait;

#[async_trait]
pub trait SystemOps: Send + Sync {
    async fn get_system(&self, id: &str) -> ClientResult<SystemConfig>;
    async fn get_system_by_name(&self, name: &str) -> ClientResult<Option<SystemConfig>>;
    async fn create_system(&self, request: &SystemRequest) -> ClientResult<SystemConfig>;
    /// Create or replace a system under a fixed ID. With `if_none_match` the
    /// call fails with 409 when the ID is already taken.
    async fn put_system(
        &self,
        id: &str,
        request: &SystemRequest,
        if_none_match: bool,
    ) -> ClientResult<SystemConfig>;
    async fn update_system(&self, id: &str, request: &SystemRequest) -> ClientResult<SystemConfig>;
    async fn delete_system(&self, id: &str) -> ClientResult<()>;
    /// Sidecar connection details for a system
    async fn get_opa_config(&self, id: &str) -> ClientResult<OpaConfig>;
}

#[async_trait]
pub trait PolicyOps: Send + Sync {
    async fn delete_policy(&self, id: &str) -> ClientResult<()>;
}

#[async_trait]
pub trait DatasourceOps: Send + Sync {
    async fn get_datasource(&self, id: &str) -> ClientResult<Option<DatasourceConfig>>;
    async fn upsert_datasource(&self, id: &str, datasource: &DatasourceConfig) -> ClientResult<()>;
    async fn delete_datasource(&self, id: &str) -> ClientResult<()>;
}

#[async_trait]
pub trait SecretOps: Send + Sync {
    async fn create_update_secret(&self, id: &str, name: &str, secret: &str) -> ClientResult<()>;
    async fn delete_secret(&self, id: &str) -> ClientResult<()>;
}

#[async_trait]
pub trait RoleBindingOps: Send + Sync {
    /// Bindings attached to a resource, `resource_kind` is `systems` or `libraries`
    async fn list_role_bindings(
        &self,
        resource_kind: &str,
        resource_id: &str,
    ) -> ClientResult<Vec<RoleBinding>>;
    async fn create_role_binding(&self, request: &CreateRoleBindingRequest) -> ClientResult<RoleBinding>;
    async fn update_role_binding_subjects(
        &self,
        binding_id: &str,
        subjects: &[Subject],
    ) -> ClientResult<()>;
    async fn delete_role_binding(&self, binding_id: &str) -> ClientResult<()>;
}

#[async_trait]
pub trait UserOps: Send + Sync {
    async fn get_users(&self) -> ClientResult<Vec<User>>;
    /// Invite a user that is not yet in the directory
    async fn create_invitation(&self, user_id: &str) -> ClientResult<()>;
}

#[async_trait]
pub trait LibraryOps: Send + Sync {
    async fn get_library(&self, id: &str) -> ClientResult<Option<LibraryConfig>>;
    async fn upsert_library(&self, id: &str, library: &LibraryConfig) -> ClientResult<()>;
}

#[async_trait]
pub trait WorkspaceOps: Send + Sync {
    async fn update_workspace(&self, settings: &serde_json::Value) -> ClientResult<()>;
}

/// Everything the reconcilers need from DAS
pub trait DasApi:
    SystemOps + PolicyOps + DatasourceOps + SecretOps + RoleBindingOps + UserOps + LibraryOps + WorkspaceOps
{
}

impl<T> DasApi for T where
    T: SystemOps
        + PolicyOps
        + DatasourceOps
        + SecretOps
        + RoleBindingOps
        + UserOps
        + LibraryOps
        + WorkspaceOps
{
}
