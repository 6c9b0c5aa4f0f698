//! Common test utilities
//!
//! In-memory fakes of every seam the reconcilers talk through. Each fake
//! records the calls it receives so tests can assert on exact external
//! traffic, and keeps just enough state to answer follow-up reads.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use opa_system_controller::cluster::{ClusterApi, DerivedKind, DerivedObject, EventRecord};
use opa_system_controller::config::ControllerConfig;
use opa_system_controller::constants::FINALIZER;
use opa_system_controller::controller::reconciler::Reconciler;
use opa_system_controller::crd::{GlobalDatasource, Library, System, SystemSpec, SystemStatus};
use opa_system_controller::provider::das::{
    CreateRoleBindingRequest, DatasourceConfig, DatasourceOps, LibraryConfig, LibraryOps,
    OpaConfig, PolicyOps, RoleBinding, RoleBindingOps, SecretOps, Subject, SystemConfig,
    SystemDatasource, SystemOps, SystemRequest, User, UserOps, WorkspaceOps,
};
use opa_system_controller::provider::ocp::{Bundle, ControlPlaneApi, Source};
use opa_system_controller::provider::s3::ObjectStorageAdmin;
use opa_system_controller::provider::webhook::Notifier;
use opa_system_controller::provider::{ClientError, ClientResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests that build real HTTP clients
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "team-a";
pub const SYSTEM_UID: &str = "6f1c2a9e-0000-4000-8000-000000000001";

/// A System with a UID, in [`NAMESPACE`], with a git origin
pub fn system(name: &str) -> System {
    let mut system = System::new(
        name,
        serde_json::from_value::<SystemSpec>(serde_json::json!({
            "sourceControl": {
                "origin": {
                    "url": "https://git.example.com/team-a/policies.git",
                    "reference": "refs/heads/main",
                    "path": "systems/payments"
                }
            },
            "subjects": [{"kind": "user", "name": "alice@example.com"}],
            "datasources": [{"path": "kubernetes/resources", "description": "cluster state"}]
        }))
        .expect("valid system spec"),
    );
    system.metadata.namespace = Some(NAMESPACE.to_string());
    system.metadata.uid = Some(SYSTEM_UID.to_string());
    system.metadata.generation = Some(1);
    system
}

pub fn with_finalizer(mut system: System) -> System {
    system.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
    system
}

pub fn with_status_id(mut system: System, id: &str) -> System {
    system.status = Some(SystemStatus {
        id: id.to_string(),
        ..SystemStatus::default()
    });
    system
}

/// Mark the System as being deleted
pub fn deleting(mut system: System) -> System {
    system.metadata.deletion_timestamp =
        Some(serde_json::from_value(serde_json::json!("2026-10-19T08:00:00Z")).expect("valid timestamp"));
    system
}

pub fn config() -> ControllerConfig {
    ControllerConfig::from_yaml_str(
        r"
das:
  address: https://tenant.das.example.com
systemUserRoles: [SystemViewer]
opaControlPlane:
  enabled: true
  address: https://ocp.example.com
  bucketName: bundles
  bucketRegion: eu-west-1
  bucketUrl: https://s3.example.com
  defaultRequirements: [shared-policies]
",
    )
    .expect("valid controller config")
}

/// All fakes of one test, plus the reconciler wired to them
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub das: Arc<FakeDas>,
    pub ocp: Arc<FakeControlPlane>,
    pub storage: Arc<FakeStorage>,
    pub notifier: Arc<FakeNotifier>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new(config: ControllerConfig) -> Self {
        let cluster = Arc::new(FakeCluster::default());
        let das = Arc::new(FakeDas::default());
        let ocp = Arc::new(FakeControlPlane::default());
        let storage = Arc::new(FakeStorage::default());
        let notifier = Arc::new(FakeNotifier::default());
        let reconciler = Reconciler::new(
            Arc::clone(&cluster) as Arc<dyn ClusterApi>,
            Arc::clone(&das) as _,
            Arc::clone(&notifier) as _,
            Arc::new(config),
        )
        .expect("valid reconciler")
        .with_control_plane(Arc::clone(&ocp) as _, Arc::clone(&storage) as _);
        Self {
            cluster,
            das,
            ocp,
            storage,
            notifier,
            reconciler: Arc::new(reconciler),
        }
    }
}

fn record(calls: &Mutex<Vec<String>>, call: impl Into<String>) {
    calls.lock().unwrap().push(call.into());
}

fn count(calls: &Mutex<Vec<String>>, prefix: &str) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.split(' ').next() == Some(prefix))
        .count()
}

// ---------------------------------------------------------------------------
// Kubernetes

#[derive(Default)]
pub struct FakeCluster {
    pub systems: Mutex<BTreeMap<(String, String), System>>,
    pub libraries: Mutex<BTreeMap<(String, String), Library>>,
    pub global_datasources: Mutex<BTreeMap<String, GlobalDatasource>>,
    pub secrets: Mutex<BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    pub derived: Mutex<BTreeMap<(DerivedKind, String, String), DerivedObject>>,
    pub events: Mutex<Vec<EventRecord>>,
    pub calls: Mutex<Vec<String>>,
    /// Status patches answer with an API error
    pub fail_status_patch: AtomicBool,
}

impl FakeCluster {
    pub fn put_system(&self, system: System) {
        let key = (
            system.metadata.namespace.clone().unwrap_or_default(),
            system.metadata.name.clone().unwrap_or_default(),
        );
        self.systems.lock().unwrap().insert(key, system);
    }

    pub fn system(&self, name: &str) -> Option<System> {
        self.systems
            .lock()
            .unwrap()
            .get(&(NAMESPACE.to_string(), name.to_string()))
            .cloned()
    }

    pub fn put_library(&self, library: Library) {
        let key = (
            library.metadata.namespace.clone().unwrap_or_default(),
            library.metadata.name.clone().unwrap_or_default(),
        );
        self.libraries.lock().unwrap().insert(key, library);
    }

    pub fn put_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        self.secrets.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
                .collect(),
        );
    }

    pub fn put_derived(&self, kind: DerivedKind, object: DerivedObject) {
        self.derived
            .lock()
            .unwrap()
            .insert((kind, object.namespace.clone(), object.name.clone()), object);
    }

    pub fn derived(&self, kind: DerivedKind, name: &str) -> Option<DerivedObject> {
        self.derived
            .lock()
            .unwrap()
            .get(&(kind, NAMESPACE.to_string(), name.to_string()))
            .cloned()
    }

    pub fn event_reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.reason.clone())
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        count(&self.calls, call)
    }

    fn update_system(&self, system: &System, update: impl FnOnce(&mut System)) -> Result<()> {
        let key = (
            system.metadata.namespace.clone().unwrap_or_default(),
            system.metadata.name.clone().unwrap_or_default(),
        );
        let mut systems = self.systems.lock().unwrap();
        let stored = systems
            .get_mut(&key)
            .ok_or_else(|| anyhow::anyhow!("System {}/{} not found", key.0, key.1))?;
        update(stored);
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_system(&self, namespace: &str, name: &str) -> Result<Option<System>> {
        Ok(self
            .systems
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn patch_system_status(&self, system: &System, status: &SystemStatus) -> Result<()> {
        record(&self.calls, "PatchStatus");
        if self.fail_status_patch.load(Ordering::Relaxed) {
            anyhow::bail!("status subresource unavailable");
        }
        self.update_system(system, |s| s.status = Some(status.clone()))
    }

    async fn add_finalizer(&self, system: &System) -> Result<()> {
        record(&self.calls, "AddFinalizer");
        self.update_system(system, |s| {
            s.metadata
                .finalizers
                .get_or_insert_with(Vec::new)
                .push(FINALIZER.to_string());
        })
    }

    async fn remove_finalizer(&self, system: &System) -> Result<()> {
        record(&self.calls, "RemoveFinalizer");
        self.update_system(system, |s| {
            if let Some(finalizers) = s.metadata.finalizers.as_mut() {
                finalizers.retain(|f| f != FINALIZER);
            }
        })
    }

    async fn get_library(&self, namespace: &str, name: &str) -> Result<Option<Library>> {
        Ok(self
            .libraries
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_global_datasource(&self, name: &str) -> Result<Option<GlobalDatasource>> {
        Ok(self.global_datasources.lock().unwrap().get(name).cloned())
    }

    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_derived(
        &self,
        kind: DerivedKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DerivedObject>> {
        Ok(self
            .derived
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_derived(&self, kind: DerivedKind, object: &DerivedObject) -> Result<()> {
        record(&self.calls, format!("Create{} {}", kind.as_str(), object.name));
        self.put_derived(kind, object.clone());
        Ok(())
    }

    async fn update_derived(&self, kind: DerivedKind, object: &DerivedObject) -> Result<()> {
        record(&self.calls, format!("Update{} {}", kind.as_str(), object.name));
        self.put_derived(kind, object.clone());
        Ok(())
    }

    async fn publish_event(&self, _reference: &ObjectReference, event: &EventRecord) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DAS

pub const OPA_TOKEN: &str = "opa-token-123";

#[derive(Default)]
pub struct FakeDas {
    pub systems: Mutex<BTreeMap<String, SystemConfig>>,
    pub datasources: Mutex<BTreeMap<String, DatasourceConfig>>,
    pub secrets: Mutex<BTreeMap<String, (String, String)>>,
    pub role_bindings: Mutex<Vec<RoleBinding>>,
    pub users: Mutex<Vec<User>>,
    pub libraries: Mutex<BTreeMap<String, LibraryConfig>>,
    /// IDs that PUT with If-None-Match reports as taken
    pub taken_ids: Mutex<BTreeSet<String>>,
    pub calls: Mutex<Vec<String>>,
    next_id: Mutex<u32>,
}

impl FakeDas {
    pub fn count(&self, call: &str) -> usize {
        count(&self.calls, call)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn insert_system(&self, id: &str, name: &str) {
        self.systems.lock().unwrap().insert(
            id.to_string(),
            SystemConfig {
                id: id.to_string(),
                name: name.to_string(),
                type_: "custom".to_string(),
                ..SystemConfig::default()
            },
        );
    }

    /// Run `f` on the datasource references of the system or library a
    /// `systems/<id>/...` or `libraries/<id>/...` datasource belongs to
    fn with_owner_references(&self, datasource_id: &str, f: impl FnOnce(&mut Vec<SystemDatasource>)) {
        let mut parts = datasource_id.splitn(3, '/');
        let (Some(kind), Some(owner)) = (parts.next(), parts.next()) else {
            return;
        };
        match kind {
            "systems" => {
                if let Some(system) = self.systems.lock().unwrap().get_mut(owner) {
                    f(&mut system.datasources);
                }
            }
            "libraries" => {
                if let Some(library) = self.libraries.lock().unwrap().get_mut(owner) {
                    f(&mut library.datasources);
                }
            }
            _ => {}
        }
    }

    fn store(&self, id: &str, request: &SystemRequest) -> SystemConfig {
        let config = SystemConfig {
            id: id.to_string(),
            name: request.name.clone(),
            description: request.description.clone(),
            type_: request.type_.clone(),
            read_only: request.read_only,
            source_control: request.source_control.clone(),
            datasources: self
                .systems
                .lock()
                .unwrap()
                .get(id)
                .map(|s| s.datasources.clone())
                .unwrap_or_default(),
            decision_mappings: request.decision_mappings.clone(),
            bundle_download: request.bundle_download.clone(),
        };
        self.systems.lock().unwrap().insert(id.to_string(), config.clone());
        config
    }
}

#[async_trait]
impl SystemOps for FakeDas {
    async fn get_system(&self, id: &str) -> ClientResult<SystemConfig> {
        record(&self.calls, format!("GetSystem {id}"));
        self.systems
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("GetSystem"))
    }

    async fn get_system_by_name(&self, name: &str) -> ClientResult<Option<SystemConfig>> {
        record(&self.calls, format!("GetSystemByName {name}"));
        Ok(self
            .systems
            .lock()
            .unwrap()
            .values()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn create_system(&self, request: &SystemRequest) -> ClientResult<SystemConfig> {
        record(&self.calls, format!("CreateSystem {}", request.name));
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("generated-{next}")
        };
        Ok(self.store(&id, request))
    }

    async fn put_system(
        &self,
        id: &str,
        request: &SystemRequest,
        if_none_match: bool,
    ) -> ClientResult<SystemConfig> {
        record(&self.calls, format!("PutSystem {id} if_none_match={if_none_match}"));
        if if_none_match && self.taken_ids.lock().unwrap().contains(id) {
            return Err(ClientError::http("PutSystem", 409, "system id already in use"));
        }
        Ok(self.store(id, request))
    }

    async fn update_system(&self, id: &str, request: &SystemRequest) -> ClientResult<SystemConfig> {
        record(&self.calls, format!("UpdateSystem {id}"));
        Ok(self.store(id, request))
    }

    async fn delete_system(&self, id: &str) -> ClientResult<()> {
        record(&self.calls, format!("DeleteSystem {id}"));
        self.systems
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found("DeleteSystem"))
    }

    async fn get_opa_config(&self, id: &str) -> ClientResult<OpaConfig> {
        record(&self.calls, format!("GetOPAConfig {id}"));
        Ok(OpaConfig {
            host_url: "https://tenant.das.example.com".to_string(),
            token: OPA_TOKEN.to_string(),
            system_id: id.to_string(),
            system_type: "custom".to_string(),
        })
    }
}

#[async_trait]
impl PolicyOps for FakeDas {
    async fn delete_policy(&self, id: &str) -> ClientResult<()> {
        record(&self.calls, format!("DeletePolicy {id}"));
        Ok(())
    }
}

#[async_trait]
impl DatasourceOps for FakeDas {
    async fn get_datasource(&self, id: &str) -> ClientResult<Option<DatasourceConfig>> {
        record(&self.calls, format!("GetDatasource {id}"));
        Ok(self.datasources.lock().unwrap().get(id).cloned())
    }

    async fn upsert_datasource(&self, id: &str, datasource: &DatasourceConfig) -> ClientResult<()> {
        record(&self.calls, format!("UpsertDatasource {id}"));
        self.datasources
            .lock()
            .unwrap()
            .insert(id.to_string(), datasource.clone());
        // DAS attaches datasources to the system or library in their path
        self.with_owner_references(id, |references| {
            if !references.iter().any(|d| d.id == id) {
                references.push(SystemDatasource {
                    id: id.to_string(),
                    category: datasource.category.clone(),
                    optional: false,
                });
            }
        });
        Ok(())
    }

    async fn delete_datasource(&self, id: &str) -> ClientResult<()> {
        record(&self.calls, format!("DeleteDatasource {id}"));
        self.datasources.lock().unwrap().remove(id);
        self.with_owner_references(id, |references| references.retain(|d| d.id != id));
        Ok(())
    }
}

#[async_trait]
impl SecretOps for FakeDas {
    async fn create_update_secret(&self, id: &str, name: &str, secret: &str) -> ClientResult<()> {
        record(&self.calls, format!("CreateUpdateSecret {id}"));
        self.secrets
            .lock()
            .unwrap()
            .insert(id.to_string(), (name.to_string(), secret.to_string()));
        Ok(())
    }

    async fn delete_secret(&self, id: &str) -> ClientResult<()> {
        record(&self.calls, format!("DeleteSecret {id}"));
        self.secrets.lock().unwrap().remove(id);
        Ok(())
    }
}

#[async_trait]
impl RoleBindingOps for FakeDas {
    async fn list_role_bindings(
        &self,
        resource_kind: &str,
        resource_id: &str,
    ) -> ClientResult<Vec<RoleBinding>> {
        record(&self.calls, format!("ListRoleBindings {resource_kind}/{resource_id}"));
        Ok(self.role_bindings.lock().unwrap().clone())
    }

    async fn create_role_binding(&self, request: &CreateRoleBindingRequest) -> ClientResult<RoleBinding> {
        record(&self.calls, format!("CreateRoleBinding {}", request.role_id));
        let binding = RoleBinding {
            id: format!("binding-{}", request.role_id),
            role_id: request.role_id.clone(),
            subjects: request.subjects.clone(),
        };
        self.role_bindings.lock().unwrap().push(binding.clone());
        Ok(binding)
    }

    async fn update_role_binding_subjects(
        &self,
        binding_id: &str,
        subjects: &[Subject],
    ) -> ClientResult<()> {
        record(&self.calls, format!("UpdateRoleBindingSubjects {binding_id}"));
        if let Some(binding) = self
            .role_bindings
            .lock()
            .unwrap()
            .iter_mut()
            .find(|b| b.id == binding_id)
        {
            binding.subjects = subjects.to_vec();
        }
        Ok(())
    }

    async fn delete_role_binding(&self, binding_id: &str) -> ClientResult<()> {
        record(&self.calls, format!("DeleteRoleBinding {binding_id}"));
        self.role_bindings.lock().unwrap().retain(|b| b.id != binding_id);
        Ok(())
    }
}

#[async_trait]
impl UserOps for FakeDas {
    async fn get_users(&self) -> ClientResult<Vec<User>> {
        record(&self.calls, "GetUsers");
        Ok(self.users.lock().unwrap().clone())
    }

    async fn create_invitation(&self, user_id: &str) -> ClientResult<()> {
        record(&self.calls, format!("CreateInvitation {user_id}"));
        self.users.lock().unwrap().push(User {
            id: user_id.to_string(),
            enabled: false,
        });
        Ok(())
    }
}

#[async_trait]
impl LibraryOps for FakeDas {
    async fn get_library(&self, id: &str) -> ClientResult<Option<LibraryConfig>> {
        record(&self.calls, format!("GetLibrary {id}"));
        Ok(self.libraries.lock().unwrap().get(id).cloned())
    }

    async fn upsert_library(&self, id: &str, library: &LibraryConfig) -> ClientResult<()> {
        record(&self.calls, format!("UpsertLibrary {id}"));
        self.libraries
            .lock()
            .unwrap()
            .insert(id.to_string(), library.clone());
        Ok(())
    }
}

#[async_trait]
impl WorkspaceOps for FakeDas {
    async fn update_workspace(&self, _settings: &serde_json::Value) -> ClientResult<()> {
        record(&self.calls, "UpdateWorkspace");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Self-hosted control plane and object storage

#[derive(Default)]
pub struct FakeControlPlane {
    pub sources: Mutex<BTreeMap<String, Source>>,
    pub bundles: Mutex<BTreeMap<String, Bundle>>,
    /// Sources whose deletion fails with 500 (still referenced elsewhere)
    pub in_use: Mutex<BTreeSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeControlPlane {
    pub fn count(&self, call: &str) -> usize {
        count(&self.calls, call)
    }
}

#[async_trait]
impl ControlPlaneApi for FakeControlPlane {
    async fn get_source(&self, name: &str) -> ClientResult<Source> {
        record(&self.calls, format!("GetSource {name}"));
        self.sources
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::not_found("GetSource"))
    }

    async fn put_source(&self, source: &Source) -> ClientResult<()> {
        record(&self.calls, format!("PutSource {}", source.name));
        self.sources
            .lock()
            .unwrap()
            .insert(source.name.clone(), source.clone());
        Ok(())
    }

    async fn delete_source(&self, name: &str) -> ClientResult<()> {
        record(&self.calls, format!("DeleteSource {name}"));
        if self.in_use.lock().unwrap().contains(name) {
            return Err(ClientError::http("DeleteSource", 500, "source in use"));
        }
        self.sources
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found("DeleteSource"))
    }

    async fn put_bundle(&self, bundle: &Bundle) -> ClientResult<()> {
        record(&self.calls, format!("PutBundle {}", bundle.name));
        self.bundles
            .lock()
            .unwrap()
            .insert(bundle.name.clone(), bundle.clone());
        Ok(())
    }

    async fn delete_bundle(&self, name: &str) -> ClientResult<()> {
        record(&self.calls, format!("DeleteBundle {name}"));
        self.bundles
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found("DeleteBundle"))
    }
}

#[derive(Default)]
pub struct FakeStorage {
    /// Access key to secret key
    pub users: Mutex<BTreeMap<String, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn count(&self, call: &str) -> usize {
        count(&self.calls, call)
    }
}

#[async_trait]
impl ObjectStorageAdmin for FakeStorage {
    async fn user_exists(&self, access_key: &str) -> ClientResult<bool> {
        record(&self.calls, format!("UserExists {access_key}"));
        Ok(self.users.lock().unwrap().contains_key(access_key))
    }

    async fn create_system_bundle_user(
        &self,
        access_key: &str,
        secret_key: &str,
        unique_name: &str,
    ) -> ClientResult<()> {
        record(&self.calls, format!("CreateSystemBundleUser {unique_name}"));
        self.users
            .lock()
            .unwrap()
            .insert(access_key.to_string(), secret_key.to_string());
        Ok(())
    }

    async fn set_new_user_secret_key(&self, access_key: &str, secret_key: &str) -> ClientResult<()> {
        record(&self.calls, format!("SetNewUserSecretKey {access_key}"));
        self.users
            .lock()
            .unwrap()
            .insert(access_key.to_string(), secret_key.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifications

#[derive(Default)]
pub struct FakeNotifier {
    pub notifications: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn system_datasource_changed(&self, system_id: &str, datasource_id: &str) -> ClientResult<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((system_id.to_string(), datasource_id.to_string()));
        Ok(())
    }

    async fn library_datasource_changed(&self, library_id: &str, datasource_id: &str) -> ClientResult<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((library_id.to_string(), datasource_id.to_string()));
        Ok(())
    }
}
