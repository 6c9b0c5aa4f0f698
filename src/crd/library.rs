//! # Library Spec
//!
//! A `Library` is a reusable policy bundle shared between systems, with its own
//! git origin, datasources and access control.

use crate::crd::{Datasource, GitRepo, Subject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[kube(
    kind = "Library",
    group = "opa.controller.io",
    version = "v1alpha1",
    namespaced,
    shortname = "lib"
)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySpec {
    /// Library ID in DAS
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_control: Option<LibrarySourceControl>,
    #[serde(default)]
    pub datasources: Vec<Datasource>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySourceControl {
    pub library_origin: GitRepo,
}
