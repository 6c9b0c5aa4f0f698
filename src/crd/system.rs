//! # System Spec
//!
//! The `System` custom resource describes one policy-enforcement unit: where its
//! policies live in git, who may manage it, which datasources it consumes and
//! how its OPA sidecar should be configured.

use crate::constants::{
    ANNOTATION_MIGRATION_ID, CONTROL_PLANE_OCP, FINALIZER, LABEL_CONTROLLER_CLASS,
    LABEL_CONTROL_PLANE,
};
use crate::crd::{Datasource, GitRepo, Subject};
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// System Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: opa.controller.io/v1beta1
/// kind: System
/// metadata:
///   name: payments
///   namespace: team-a
/// spec:
///   sourceControl:
///     origin:
///       url: https://git.example.com/team-a/policies.git
///       reference: refs/heads/main
///       path: systems/payments
///   subjects:
///     - kind: group
///       name: team-a-admins
///   datasources:
///     - path: kubernetes/resources
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[kube(
    kind = "System",
    group = "opa.controller.io",
    version = "v1beta1",
    namespaced,
    status = "crate::crd::SystemStatus",
    shortname = "sys",
    printcolumn = r#"{"name":"ID", "type":"string", "jsonPath":".status.id"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SystemSpec {
    /// When true the external system is kept when the resource is deleted.
    /// Unset falls back to the controller default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_protection: Option<bool>,
    #[serde(default)]
    pub datasources: Vec<Datasource>,
    /// Local plane (SLP) the sidecar talks to instead of DAS directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_plane: Option<LocalPlane>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub decision_mappings: Vec<DecisionMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_control: Option<SourceControl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_delta_bundles: Option<bool>,
    /// Merged over the generated OPA configuration. Maps merge, scalars replace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::crd::preserve_unknown_fields")]
    pub custom_opa_config: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalPlane {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceControl {
    pub origin: GitRepo,
}

/// Maps fields of a decision to columns shown in the decision log viewer
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMapping {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<AllowedMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonMapping>,
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllowedMapping {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<ExpectedValue>,
    #[serde(default)]
    pub negated: bool,
}

/// Exactly one of the fields is expected to be set
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReasonMapping {
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub key: String,
    pub path: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// Control plane a System is reconciled against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPlane {
    /// The hosted policy-administration service
    Das,
    /// The self-hosted OPA control plane (sources + bundles in object storage)
    OpaControlPlane,
}

impl ControlPlane {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlPlane::Das => crate::constants::CONTROL_PLANE_DAS,
            ControlPlane::OpaControlPlane => CONTROL_PLANE_OCP,
        }
    }
}

impl System {
    /// Name shown in DAS: `<prefix><namespace>/<name><suffix>`
    pub fn display_name(&self, prefix: &str, suffix: &str) -> String {
        format!(
            "{}{}/{}{}",
            prefix,
            self.namespace().unwrap_or_default(),
            self.name_any(),
            suffix
        )
    }

    /// Name used for sources, bundles and object-storage principals on the
    /// self-hosted plane, where `/` is not allowed
    pub fn unique_name(&self, prefix: &str, suffix: &str) -> String {
        self.display_name(prefix, suffix).replace('/', "-")
    }

    pub fn control_plane(&self) -> ControlPlane {
        match self.labels().get(LABEL_CONTROL_PLANE).map(String::as_str) {
            Some(CONTROL_PLANE_OCP) => ControlPlane::OpaControlPlane,
            _ => ControlPlane::Das,
        }
    }

    pub fn deletion_protected(&self, default: bool) -> bool {
        self.spec.deletion_protection.unwrap_or(default)
    }

    pub fn delta_bundles(&self) -> bool {
        self.spec.enable_delta_bundles.unwrap_or(false)
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER)
    }

    pub fn migration_id(&self) -> Option<&str> {
        self.annotations()
            .get(ANNOTATION_MIGRATION_ID)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// External ID recorded in status, if any
    pub fn status_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn git_origin(&self) -> Option<&GitRepo> {
        self.spec.source_control.as_ref().map(|sc| &sc.origin)
    }
}

/// True when the resource's class label matches this controller instance.
/// An empty class matches resources without the label.
pub(crate) fn class_matches<K: ResourceExt>(obj: &K, controller_class: &str) -> bool {
    let label = obj
        .labels()
        .get(LABEL_CONTROLLER_CLASS)
        .map(String::as_str)
        .unwrap_or_default();
    label == controller_class
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn system(labels: &[(&str, &str)]) -> System {
        let mut sys = System::new("payments", SystemSpec::default());
        sys.metadata.namespace = Some("team-a".to_string());
        sys.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        sys
    }

    #[test]
    fn test_display_name_is_namespace_qualified() {
        let sys = system(&[]);
        assert_eq!(sys.display_name("", ""), "team-a/payments");
        assert_eq!(sys.display_name("dev-", "-eu"), "dev-team-a/payments-eu");
        assert_eq!(sys.unique_name("dev-", ""), "dev-team-a-payments");
    }

    #[test]
    fn test_control_plane_label() {
        assert_eq!(system(&[]).control_plane(), ControlPlane::Das);
        assert_eq!(
            system(&[(LABEL_CONTROL_PLANE, CONTROL_PLANE_OCP)]).control_plane(),
            ControlPlane::OpaControlPlane
        );
        assert_eq!(
            system(&[(LABEL_CONTROL_PLANE, "something-else")]).control_plane(),
            ControlPlane::Das
        );
    }

    #[test]
    fn test_class_matches() {
        assert!(class_matches(&system(&[]), ""));
        assert!(!class_matches(&system(&[]), "blue"));
        assert!(class_matches(&system(&[(LABEL_CONTROLLER_CLASS, "blue")]), "blue"));
        assert!(!class_matches(&system(&[(LABEL_CONTROLLER_CLASS, "green")]), "blue"));
    }

    #[test]
    fn test_deletion_protection_default() {
        let mut sys = system(&[]);
        assert!(sys.deletion_protected(true));
        assert!(!sys.deletion_protected(false));
        sys.spec.deletion_protection = Some(false);
        assert!(!sys.deletion_protected(true));
    }
}
