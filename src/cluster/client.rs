//! # Kubernetes-backed Cluster Access

use super::{ClusterApi, DerivedKind, DerivedObject, EventKind, EventRecord};
use crate::constants::{CONTROLLER_NAME, FINALIZER};
use crate::crd::{GlobalDatasource, Library, System, SystemStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, ObjectReference, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    recorder: Recorder,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    fn systems(&self, namespace: &str) -> Api<System> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn set_finalizers(&self, system: &System, finalizers: Vec<String>) -> Result<()> {
        let namespace = system.namespace().unwrap_or_default();
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": system.resource_version(),
            }
        });
        self.systems(&namespace)
            .patch(
                &system.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
            .with_context(|| format!("Failed to update finalizers of System {namespace}/{}", system.name_any()))?;
        Ok(())
    }
}

fn derived_meta(object: &DerivedObject) -> ObjectMeta {
    ObjectMeta {
        name: Some(object.name.clone()),
        namespace: Some(object.namespace.clone()),
        labels: Some(object.labels.clone()),
        owner_references: Some(object.owner_references.clone()),
        resource_version: object.resource_version.clone(),
        ..ObjectMeta::default()
    }
}

fn secret_to_derived(secret: Secret) -> DerivedObject {
    let data = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.0))
        .collect();
    DerivedObject {
        name: secret.metadata.name.unwrap_or_default(),
        namespace: secret.metadata.namespace.unwrap_or_default(),
        labels: secret.metadata.labels.unwrap_or_default(),
        owner_references: secret.metadata.owner_references.unwrap_or_default(),
        data,
        resource_version: secret.metadata.resource_version,
    }
}

fn config_map_to_derived(config_map: ConfigMap) -> DerivedObject {
    let data = config_map
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.into_bytes()))
        .collect();
    DerivedObject {
        name: config_map.metadata.name.unwrap_or_default(),
        namespace: config_map.metadata.namespace.unwrap_or_default(),
        labels: config_map.metadata.labels.unwrap_or_default(),
        owner_references: config_map.metadata.owner_references.unwrap_or_default(),
        data,
        resource_version: config_map.metadata.resource_version,
    }
}

fn derived_to_secret(object: &DerivedObject) -> Secret {
    Secret {
        metadata: derived_meta(object),
        data: Some(
            object
                .data
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        ..Secret::default()
    }
}

fn derived_to_config_map(object: &DerivedObject) -> Result<ConfigMap> {
    let data = object
        .data
        .iter()
        .map(|(k, v)| {
            String::from_utf8(v.clone())
                .map(|s| (k.clone(), s))
                .with_context(|| format!("ConfigMap key {k} is not valid UTF-8"))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    Ok(ConfigMap {
        metadata: derived_meta(object),
        data: Some(data),
        ..ConfigMap::default()
    })
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get_system(&self, namespace: &str, name: &str) -> Result<Option<System>> {
        self.systems(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get System {namespace}/{name}"))
    }

    async fn patch_system_status(&self, system: &System, status: &SystemStatus) -> Result<()> {
        let namespace = system.namespace().unwrap_or_default();
        let patch = serde_json::json!({ "status": status });
        self.systems(&namespace)
            .patch_status(
                &system.name_any(),
                &PatchParams::apply(CONTROLLER_NAME),
                &Patch::Merge(&patch),
            )
            .await
            .with_context(|| format!("Failed to update status of System {namespace}/{}", system.name_any()))?;
        Ok(())
    }

    async fn add_finalizer(&self, system: &System) -> Result<()> {
        let mut finalizers = system.finalizers().to_vec();
        if finalizers.iter().any(|f| f == FINALIZER) {
            return Ok(());
        }
        finalizers.push(FINALIZER.to_string());
        self.set_finalizers(system, finalizers).await
    }

    async fn remove_finalizer(&self, system: &System) -> Result<()> {
        let finalizers: Vec<String> = system
            .finalizers()
            .iter()
            .filter(|f| *f != FINALIZER)
            .cloned()
            .collect();
        self.set_finalizers(system, finalizers).await
    }

    async fn get_library(&self, namespace: &str, name: &str) -> Result<Option<Library>> {
        Api::<Library>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get Library {namespace}/{name}"))
    }

    async fn get_global_datasource(&self, name: &str) -> Result<Option<GlobalDatasource>> {
        Api::<GlobalDatasource>::all(self.client.clone())
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get GlobalDatasource {name}"))
    }

    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
        let secret = Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get Secret {namespace}/{name}"))?;
        Ok(secret.map(|s| secret_to_derived(s).data))
    }

    async fn get_derived(
        &self,
        kind: DerivedKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DerivedObject>> {
        let context = || format!("Failed to get {} {namespace}/{name}", kind.as_str());
        match kind {
            DerivedKind::Secret => Ok(Api::<Secret>::namespaced(self.client.clone(), namespace)
                .get_opt(name)
                .await
                .with_context(context)?
                .map(secret_to_derived)),
            DerivedKind::ConfigMap => Ok(Api::<ConfigMap>::namespaced(self.client.clone(), namespace)
                .get_opt(name)
                .await
                .with_context(context)?
                .map(config_map_to_derived)),
        }
    }

    async fn create_derived(&self, kind: DerivedKind, object: &DerivedObject) -> Result<()> {
        let context = || {
            format!(
                "Failed to create {} {}/{}",
                kind.as_str(),
                object.namespace,
                object.name
            )
        };
        let params = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        };
        match kind {
            DerivedKind::Secret => {
                Api::<Secret>::namespaced(self.client.clone(), &object.namespace)
                    .create(&params, &derived_to_secret(object))
                    .await
                    .with_context(context)?;
            }
            DerivedKind::ConfigMap => {
                Api::<ConfigMap>::namespaced(self.client.clone(), &object.namespace)
                    .create(&params, &derived_to_config_map(object)?)
                    .await
                    .with_context(context)?;
            }
        }
        debug!(kind = kind.as_str(), name = object.name.as_str(), "Created derived object");
        Ok(())
    }

    async fn update_derived(&self, kind: DerivedKind, object: &DerivedObject) -> Result<()> {
        let context = || {
            format!(
                "Failed to update {} {}/{}",
                kind.as_str(),
                object.namespace,
                object.name
            )
        };
        let params = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        };
        match kind {
            DerivedKind::Secret => {
                Api::<Secret>::namespaced(self.client.clone(), &object.namespace)
                    .replace(&object.name, &params, &derived_to_secret(object))
                    .await
                    .with_context(context)?;
            }
            DerivedKind::ConfigMap => {
                Api::<ConfigMap>::namespaced(self.client.clone(), &object.namespace)
                    .replace(&object.name, &params, &derived_to_config_map(object)?)
                    .await
                    .with_context(context)?;
            }
        }
        debug!(kind = kind.as_str(), name = object.name.as_str(), "Updated derived object");
        Ok(())
    }

    async fn publish_event(&self, reference: &ObjectReference, event: &EventRecord) -> Result<()> {
        let event = Event {
            type_: match event.kind {
                EventKind::Normal => EventType::Normal,
                EventKind::Warning => EventType::Warning,
            },
            reason: event.reason.clone(),
            note: event.note.clone(),
            action: event.action.clone(),
            secondary: None,
        };
        self.recorder
            .publish(&event, reference)
            .await
            .context("Failed to publish event")?;
        Ok(())
    }
}
