//! # DAS REST Client
//!
//! Implements the DAS capability traits over HTTP. Each call runs in its own
//! `das.*` span so a reconcile trace shows every external round trip.

use super::types::*;
use super::{
    DatasourceOps, LibraryOps, PolicyOps, RoleBindingOps, SecretOps, SystemOps, UserOps,
    WorkspaceOps,
};
use crate::config::DasConfig;
use crate::provider::{optional, ClientError, ClientResult, RestClient};
use async_trait::async_trait;
use reqwest::Method;
use tracing::{info_span, Instrument};

const API: &str = "das";

#[derive(Debug, Clone)]
pub struct DasClient {
    rest: RestClient,
}

impl DasClient {
    pub fn new(config: &DasConfig) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestClient::new(API, &config.address, &config.token)?,
        })
    }

    async fn get_result<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
    ) -> ClientResult<T> {
        let envelope: Envelope<T> = self
            .rest
            .send_json(operation, self.rest.request(Method::GET, path))
            .await?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl SystemOps for DasClient {
    async fn get_system(&self, id: &str) -> ClientResult<SystemConfig> {
        self.get_result("GetSystem", &format!("/v1/systems/{id}"))
            .instrument(info_span!("das.system.get", system.id = id))
            .await
    }

    async fn get_system_by_name(&self, name: &str) -> ClientResult<Option<SystemConfig>> {
        async {
            let request = self
                .rest
                .request(Method::GET, "/v1/systems")
                .query(&[("name", name)]);
            let envelope: Envelope<Vec<SystemConfig>> =
                self.rest.send_json("GetSystemByName", request).await?;
            // The name filter is a prefix match on some tenants
            Ok(envelope.result.into_iter().find(|s| s.name == name))
        }
        .instrument(info_span!("das.system.get_by_name", system.name = name))
        .await
    }

    async fn create_system(&self, request: &SystemRequest) -> ClientResult<SystemConfig> {
        async {
            let rb = self.rest.request(Method::POST, "/v1/systems").json(request);
            let envelope: Envelope<SystemConfig> = self.rest.send_json("CreateSystem", rb).await?;
            Ok(envelope.result)
        }
        .instrument(info_span!("das.system.create", system.name = request.name.as_str()))
        .await
    }

    async fn put_system(
        &self,
        id: &str,
        request: &SystemRequest,
        if_none_match: bool,
    ) -> ClientResult<SystemConfig> {
        async {
            let mut rb = self
                .rest
                .request(Method::PUT, &format!("/v1/systems/{id}"))
                .json(request);
            if if_none_match {
                rb = rb.header(reqwest::header::IF_NONE_MATCH, "*");
            }
            let envelope: Envelope<SystemConfig> = self.rest.send_json("PutSystem", rb).await?;
            Ok(envelope.result)
        }
        .instrument(info_span!("das.system.put", system.id = id, if_none_match))
        .await
    }

    async fn update_system(&self, id: &str, request: &SystemRequest) -> ClientResult<SystemConfig> {
        async {
            let rb = self
                .rest
                .request(Method::PUT, &format!("/v1/systems/{id}"))
                .json(request);
            let envelope: Envelope<SystemConfig> = self.rest.send_json("UpdateSystem", rb).await?;
            Ok(envelope.result)
        }
        .instrument(info_span!("das.system.update", system.id = id))
        .await
    }

    async fn delete_system(&self, id: &str) -> ClientResult<()> {
        let rb = self.rest.request(Method::DELETE, &format!("/v1/systems/{id}"));
        self.rest
            .send_empty("DeleteSystem", rb)
            .instrument(info_span!("das.system.delete", system.id = id))
            .await
    }

    async fn get_opa_config(&self, id: &str) -> ClientResult<OpaConfig> {
        async {
            let rb = self
                .rest
                .request(Method::GET, &format!("/v1/systems/{id}/assets/opa-config"));
            let response = self.rest.send("GetOPAConfig", rb).await?;
            let body = response.text().await.map_err(|source| ClientError::Transport {
                operation: "GetOPAConfig".to_string(),
                source,
            })?;
            OpaConfig::from_yaml(&body).map_err(|message| ClientError::Decode {
                operation: "GetOPAConfig".to_string(),
                message,
            })
        }
        .instrument(info_span!("das.system.opa_config", system.id = id))
        .await
    }
}

#[async_trait]
impl PolicyOps for DasClient {
    async fn delete_policy(&self, id: &str) -> ClientResult<()> {
        let rb = self.rest.request(Method::DELETE, &format!("/v1/policies/{id}"));
        self.rest
            .send_empty("DeletePolicy", rb)
            .instrument(info_span!("das.policy.delete", policy.id = id))
            .await
    }
}

#[async_trait]
impl DatasourceOps for DasClient {
    async fn get_datasource(&self, id: &str) -> ClientResult<Option<DatasourceConfig>> {
        optional(
            self.get_result("GetDatasource", &format!("/v1/datasources/{id}"))
                .instrument(info_span!("das.datasource.get", datasource.id = id))
                .await,
        )
    }

    async fn upsert_datasource(&self, id: &str, datasource: &DatasourceConfig) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::PUT, &format!("/v1/datasources/{id}"))
            .json(datasource);
        self.rest
            .send_empty("UpsertDatasource", rb)
            .instrument(info_span!("das.datasource.upsert", datasource.id = id))
            .await
    }

    async fn delete_datasource(&self, id: &str) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::DELETE, &format!("/v1/datasources/{id}"));
        self.rest
            .send_empty("DeleteDatasource", rb)
            .instrument(info_span!("das.datasource.delete", datasource.id = id))
            .await
    }
}

#[async_trait]
impl SecretOps for DasClient {
    async fn create_update_secret(&self, id: &str, name: &str, secret: &str) -> ClientResult<()> {
        let body = SecretRequest {
            name: name.to_string(),
            secret: secret.to_string(),
        };
        let rb = self
            .rest
            .request(Method::PUT, &format!("/v1/secrets/{id}"))
            .json(&body);
        self.rest
            .send_empty("CreateUpdateSecret", rb)
            .instrument(info_span!("das.secret.upsert", secret.id = id))
            .await
    }

    async fn delete_secret(&self, id: &str) -> ClientResult<()> {
        let rb = self.rest.request(Method::DELETE, &format!("/v1/secrets/{id}"));
        self.rest
            .send_empty("DeleteSecret", rb)
            .instrument(info_span!("das.secret.delete", secret.id = id))
            .await
    }
}

#[async_trait]
impl RoleBindingOps for DasClient {
    async fn list_role_bindings(
        &self,
        resource_kind: &str,
        resource_id: &str,
    ) -> ClientResult<Vec<RoleBinding>> {
        async {
            let rb = self
                .rest
                .request(Method::GET, "/v2/authz/rolebindings")
                .query(&[("resource_kind", resource_kind), ("resource_id", resource_id)]);
            let envelope: Envelope<Vec<RoleBinding>> =
                self.rest.send_json("ListRoleBindings", rb).await?;
            Ok(envelope.result)
        }
        .instrument(info_span!(
            "das.rolebinding.list",
            resource.kind = resource_kind,
            resource.id = resource_id
        ))
        .await
    }

    async fn create_role_binding(&self, request: &CreateRoleBindingRequest) -> ClientResult<RoleBinding> {
        async {
            let rb = self
                .rest
                .request(Method::POST, "/v2/authz/rolebindings")
                .json(request);
            let envelope: Envelope<RoleBinding> =
                self.rest.send_json("CreateRoleBinding", rb).await?;
            Ok(envelope.result)
        }
        .instrument(info_span!(
            "das.rolebinding.create",
            resource.id = request.resource_id.as_str(),
            role.id = request.role_id.as_str()
        ))
        .await
    }

    async fn update_role_binding_subjects(
        &self,
        binding_id: &str,
        subjects: &[Subject],
    ) -> ClientResult<()> {
        let rb = self
            .rest
            .request(
                Method::POST,
                &format!("/v2/authz/rolebindings/{binding_id}/subjects"),
            )
            .json(&serde_json::json!({ "subjects": subjects }));
        self.rest
            .send_empty("UpdateRoleBindingSubjects", rb)
            .instrument(info_span!("das.rolebinding.update", binding.id = binding_id))
            .await
    }

    async fn delete_role_binding(&self, binding_id: &str) -> ClientResult<()> {
        let rb = self.rest.request(
            Method::DELETE,
            &format!("/v2/authz/rolebindings/{binding_id}"),
        );
        self.rest
            .send_empty("DeleteRoleBinding", rb)
            .instrument(info_span!("das.rolebinding.delete", binding.id = binding_id))
            .await
    }
}

#[async_trait]
impl UserOps for DasClient {
    async fn get_users(&self) -> ClientResult<Vec<User>> {
        self.get_result("GetUsers", "/v1/users")
            .instrument(info_span!("das.users.get"))
            .await
    }

    async fn create_invitation(&self, user_id: &str) -> ClientResult<()> {
        let body = InvitationRequest {
            user_id: user_id.to_string(),
        };
        let rb = self
            .rest
            .request(Method::POST, "/v1/invitations")
            .json(&body);
        self.rest
            .send_empty("CreateInvitation", rb)
            .instrument(info_span!("das.invitation.create"))
            .await
    }
}

#[async_trait]
impl LibraryOps for DasClient {
    async fn get_library(&self, id: &str) -> ClientResult<Option<LibraryConfig>> {
        optional(
            self.get_result("GetLibrary", &format!("/v1/libraries/{id}"))
                .instrument(info_span!("das.library.get", library.id = id))
                .await,
        )
    }

    async fn upsert_library(&self, id: &str, library: &LibraryConfig) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::PUT, &format!("/v1/libraries/{id}"))
            .json(library);
        self.rest
            .send_empty("UpsertLibrary", rb)
            .instrument(info_span!("das.library.upsert", library.id = id))
            .await
    }
}

#[async_trait]
impl WorkspaceOps for DasClient {
    async fn update_workspace(&self, settings: &serde_json::Value) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::PUT, "/v1/workspace")
            .json(settings);
        self.rest
            .send_empty("UpdateWorkspace", rb)
            .instrument(info_span!("das.workspace.update"))
            .await
    }
}
