//! # DAS Request and Response Types
//!
//! Only the fields the reconcilers read or write are modelled. Unknown fields
//! on subjects are kept so a binding can be written back without losing them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every DAS response wraps its payload in `{"result": ...}`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub result: T,
}

/// A system as stored in DAS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_control: Option<SourceControlConfig>,
    #[serde(default)]
    pub datasources: Vec<SystemDatasource>,
    #[serde(default)]
    pub decision_mappings: BTreeMap<String, DecisionMappingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_download: Option<BundleDownloadConfig>,
}

/// Body of create, put and update system calls
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemRequest {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_control: Option<SourceControlConfig>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub decision_mappings: BTreeMap<String, DecisionMappingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_download: Option<BundleDownloadConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceControlConfig {
    pub origin: GitRepoConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepoConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// ID of the DAS secret holding the git credentials
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credentials: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDownloadConfig {
    #[serde(default)]
    pub delta_bundles: bool,
}

/// Datasource reference in a system or library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemDatasource {
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMappingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<AllowedMappingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonMappingConfig>,
    #[serde(default)]
    pub columns: Vec<ColumnMappingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowedMappingConfig {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonMappingConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMappingConfig {
    pub key: String,
    pub path: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
}

/// A datasource as stored in DAS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasourceConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// `push` for datasources fed by an external loader, `pull` for git
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credentials: String,
}

/// Body of a secret create-or-update call
#[derive(Clone, Serialize)]
pub struct SecretRequest {
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for SecretRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRequest")
            .field("name", &self.name)
            .field("secret", &"***")
            .finish()
    }
}

pub const SUBJECT_KIND_USER: &str = "user";
pub const SUBJECT_KIND_CLAIM: &str = "claim";

/// A principal in a DAS role binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_config: Option<ClaimConfig>,
    /// Fields of subject kinds this controller does not manage
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimConfig {
    pub identity_provider: String,
    pub key: String,
    pub value: String,
}

impl Subject {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: SUBJECT_KIND_USER.to_string(),
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn claim(identity_provider: &str, key: &str, value: &str) -> Self {
        Self {
            kind: SUBJECT_KIND_CLAIM.to_string(),
            claim_config: Some(ClaimConfig {
                identity_provider: identity_provider.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            }),
            ..Self::default()
        }
    }

    /// Users and claims are owned by the controller, other kinds are left alone
    pub fn is_managed_kind(&self) -> bool {
        self.kind == SUBJECT_KIND_USER || self.kind == SUBJECT_KIND_CLAIM
    }
}

/// Role binding as returned by `/v2/authz/rolebindings`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub id: String,
    pub role_id: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRoleBindingRequest {
    pub resource_kind: String,
    pub resource_id: String,
    pub role_id: String,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationRequest {
    pub user_id: String,
}

/// Library as stored in DAS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_control: Option<LibrarySourceControlConfig>,
    #[serde(default)]
    pub datasources: Vec<SystemDatasource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySourceControlConfig {
    pub library_origin: GitRepoConfig,
}

/// Connection details for an OPA sidecar, extracted from the system's
/// `opa-config` asset
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OpaConfig {
    /// Tenant URL without the API suffix, e.g. `https://tenant.das.example.com`
    pub host_url: String,
    pub token: String,
    pub system_id: String,
    pub system_type: String,
}

impl std::fmt::Debug for OpaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaConfig")
            .field("host_url", &self.host_url)
            .field("token", &"***")
            .field("system_id", &self.system_id)
            .field("system_type", &self.system_type)
            .finish()
    }
}

/// Raw shape of the `opa-config` asset (an OPA configuration file)
#[derive(Debug, Deserialize)]
pub(crate) struct RawOpaConfig {
    #[serde(default)]
    pub services: Vec<RawService>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawService {
    pub url: String,
    #[serde(default)]
    pub credentials: Option<RawCredentials>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCredentials {
    pub bearer: Option<RawBearer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBearer {
    #[serde(default)]
    pub token: String,
}

impl OpaConfig {
    /// Extract the connection details from an `opa-config` YAML document
    pub fn from_yaml(raw: &str) -> Result<Self, String> {
        let parsed: RawOpaConfig = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
        let service = parsed
            .services
            .first()
            .ok_or_else(|| "opa-config has no services".to_string())?;
        let token = service
            .credentials
            .as_ref()
            .and_then(|c| c.bearer.as_ref())
            .map(|b| b.token.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "opa-config has no bearer token".to_string())?;
        let url = service.url.trim_end_matches('/');
        let host_url = url.strip_suffix("/v1").unwrap_or(url).to_string();
        Ok(Self {
            host_url,
            token,
            system_id: parsed.labels.get("system-id").cloned().unwrap_or_default(),
            system_type: parsed.labels.get("system-type").cloned().unwrap_or_default(),
        })
    }
}
