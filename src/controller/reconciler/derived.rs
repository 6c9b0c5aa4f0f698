//! # Derived Objects
//!
//! Secrets and ConfigMaps generated for a System's sidecar. Every derived
//! object carries a controller owner reference to its System so it is garbage
//! collected with it. An object of the same name that the System does not own
//! is never overwritten.

use crate::cluster::{ClusterApi, DerivedKind, DerivedObject};
use crate::constants::{CONTROLLER_NAME, LABEL_MANAGED_BY};
use crate::crd::System;
use anyhow::{Context, Result};
use kube::{Resource, ResourceExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Create or update `name` so its data equals `data`
///
/// # Errors
///
/// Fails when an object with the same name exists and is not owned by
/// `owner`, or when the API call fails.
pub async fn ensure_owned(
    cluster: &dyn ClusterApi,
    owner: &System,
    kind: DerivedKind,
    name: &str,
    data: BTreeMap<String, Vec<u8>>,
) -> Result<DerivedOutcome> {
    let namespace = owner.namespace().unwrap_or_default();
    let owner_uid = owner.uid().unwrap_or_default();
    let owner_reference = owner
        .controller_owner_ref(&())
        .context("System has no UID yet, cannot own derived objects")?;

    match cluster.get_derived(kind, &namespace, name).await? {
        None => {
            info!("✅ Creating {} {}/{}", kind.as_str(), namespace, name);
            let object = DerivedObject {
                name: name.to_string(),
                namespace,
                labels: BTreeMap::from([(LABEL_MANAGED_BY.to_string(), CONTROLLER_NAME.to_string())]),
                owner_references: vec![owner_reference],
                data,
                resource_version: None,
            };
            cluster.create_derived(kind, &object).await?;
            Ok(DerivedOutcome::Created)
        }
        Some(existing) if !existing.is_owned_by(&owner_uid) => {
            anyhow::bail!(
                "{} {}/{} exists and is not owned by System {}",
                kind.as_str(),
                namespace,
                name,
                owner.name_any()
            )
        }
        Some(existing) if existing.data == data => {
            debug!("{} {}/{} up to date", kind.as_str(), namespace, name);
            Ok(DerivedOutcome::Unchanged)
        }
        Some(mut existing) => {
            info!("🔄 Updating {} {}/{}", kind.as_str(), namespace, name);
            existing.data = data;
            cluster.update_derived(kind, &existing).await?;
            Ok(DerivedOutcome::Updated)
        }
    }
}

/// Deep-merge `overrides` into `base`. Maps merge recursively, anything else
/// in `overrides` replaces the value in `base`.
pub fn merge_values(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(Value::Object(base_map)), Value::Object(override_map)) => {
                merge_values(base_map, override_map);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Render a configuration document as YAML bytes
pub fn render_yaml(value: &Value) -> Result<Vec<u8>> {
    serde_yaml::to_string(value)
        .map(String::into_bytes)
        .context("Failed to render YAML")
}

/// Single-key data map
pub fn single_entry(key: &str, value: impl Into<Vec<u8>>) -> BTreeMap<String, Vec<u8>> {
    BTreeMap::from([(key.to_string(), value.into())])
}
