//! # GlobalDatasource Spec
//!
//! A cluster-wide datasource, mapped to `global/<name>` in DAS.

use crate::crd::SecretRef;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[kube(
    kind = "GlobalDatasource",
    group = "opa.controller.io",
    version = "v1alpha1",
    shortname = "gds"
)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDatasourceSpec {
    pub name: String,
    /// Datasource category, e.g. `git/rego` or `git/data`
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Secret with `username` and `password` keys. When unset, credentials
    /// are resolved from the controller configuration by URL prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<SecretRef>,
}

impl GlobalDatasource {
    /// Datasource ID in DAS
    pub fn datasource_id(&self) -> String {
        format!("global/{}", self.spec.name)
    }

    /// ID of the DAS secret holding the git credentials
    pub fn secret_id(&self) -> String {
        format!("global/{}/git", self.spec.name)
    }
}
