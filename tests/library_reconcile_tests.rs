//! # Library and GlobalDatasource Reconciliation Tests

mod common;

use common::{config, Harness, NAMESPACE};
use opa_system_controller::controller::reconciler::{reconcile_global_datasource, reconcile_library};
use opa_system_controller::crd::{GlobalDatasource, GlobalDatasourceSpec, Library, LibrarySpec, SecretRef};
use opa_system_controller::provider::das::{LibraryConfig, SystemDatasource};
use std::sync::Arc;

fn library() -> Library {
    let mut library = Library::new(
        "shared",
        serde_json::from_value::<LibrarySpec>(serde_json::json!({
            "name": "shared",
            "description": "Shared helpers",
            "sourceControl": {
                "libraryOrigin": {
                    "url": "https://git.example.com/platform/shared.git",
                    "reference": "refs/heads/main",
                    "credentialsSecretName": "git-creds"
                }
            },
            "subjects": [{"kind": "user", "name": "bob@example.com"}],
            "datasources": [{"path": "data/users", "description": "user directory"}]
        }))
        .expect("valid library spec"),
    );
    library.metadata.namespace = Some(NAMESPACE.to_string());
    library
}

fn global_datasource() -> GlobalDatasource {
    GlobalDatasource::new(
        "entitlements",
        GlobalDatasourceSpec {
            name: "entitlements".to_string(),
            category: "git/data".to_string(),
            description: "Entitlement data".to_string(),
            url: Some("https://git.example.com/platform/entitlements.git".to_string()),
            reference: Some("refs/heads/main".to_string()),
            credentials_secret_ref: Some(SecretRef {
                namespace: "platform".to_string(),
                name: "entitlements-git".to_string(),
            }),
            ..GlobalDatasourceSpec::default()
        },
    )
}

async fn reconcile_shared(harness: &Harness) -> bool {
    reconcile_library(Arc::new(library()), Arc::clone(&harness.reconciler))
        .await
        .is_ok()
}

#[tokio::test]
async fn test_new_library_is_created_with_credentials_and_datasources() {
    let harness = Harness::new(config());
    harness.cluster.put_library(library());
    harness
        .cluster
        .put_secret(NAMESPACE, "git-creds", &[("name", "bot"), ("secret", "hunter2")]);

    assert!(reconcile_shared(&harness).await);

    let das = &harness.das;
    assert_eq!(
        das.secrets.lock().unwrap().get("libraries/shared/git"),
        Some(&("bot".to_string(), "hunter2".to_string()))
    );
    let stored = das.libraries.lock().unwrap().get("shared").cloned().unwrap();
    assert_eq!(stored.description, "Shared helpers");
    let origin = &stored.source_control.as_ref().unwrap().library_origin;
    assert_eq!(origin.credentials, "libraries/shared/git");
    assert_eq!(das.count("CreateRoleBinding"), 1);
    assert!(das
        .calls()
        .contains(&"UpsertDatasource libraries/shared/data/users".to_string()));
    assert_eq!(
        harness.notifier.notifications.lock().unwrap().as_slice(),
        &[("shared".to_string(), "libraries/shared/data/users".to_string())]
    );
}

#[tokio::test]
async fn test_library_in_sync_is_not_rewritten() {
    let harness = Harness::new(config());
    harness.cluster.put_library(library());
    harness
        .cluster
        .put_secret(NAMESPACE, "git-creds", &[("name", "bot"), ("secret", "hunter2")]);
    assert!(reconcile_shared(&harness).await);

    assert!(reconcile_shared(&harness).await);

    assert_eq!(harness.das.count("UpsertLibrary"), 1);
    assert_eq!(harness.das.count("UpsertDatasource"), 1);
    assert_eq!(harness.das.count("CreateRoleBinding"), 1);
}

#[tokio::test]
async fn test_undeclared_library_datasources_are_removed() {
    let mut cfg = config();
    cfg.datasource_ignore_patterns = vec!["^libraries/[^/]+/external/.*".to_string()];
    let harness = Harness::new(cfg);
    harness.cluster.put_library(library());
    harness
        .cluster
        .put_secret(NAMESPACE, "git-creds", &[("name", "bot"), ("secret", "hunter2")]);
    harness.das.libraries.lock().unwrap().insert(
        "shared".to_string(),
        LibraryConfig {
            id: "shared".to_string(),
            datasources: vec![
                SystemDatasource {
                    id: "libraries/shared/stale".to_string(),
                    category: "rest".to_string(),
                    optional: false,
                },
                SystemDatasource {
                    id: "libraries/shared/optional".to_string(),
                    category: "rest".to_string(),
                    optional: true,
                },
                SystemDatasource {
                    id: "libraries/shared/external/feed".to_string(),
                    category: "rest".to_string(),
                    optional: false,
                },
            ],
            ..LibraryConfig::default()
        },
    );

    assert!(reconcile_shared(&harness).await);

    let calls = harness.das.calls();
    assert!(calls.contains(&"DeleteDatasource libraries/shared/stale".to_string()));
    assert_eq!(harness.das.count("DeleteDatasource"), 1);
    assert!(calls.contains(&"UpsertDatasource libraries/shared/data/users".to_string()));
}

#[tokio::test]
async fn test_library_with_missing_credentials_secret_fails() {
    let harness = Harness::new(config());
    harness.cluster.put_library(library());

    assert!(!reconcile_shared(&harness).await);

    assert_eq!(harness.das.count("UpsertLibrary"), 0);
    assert!(harness
        .cluster
        .event_reasons()
        .contains(&"FailedSyncLibrary".to_string()));
}

#[tokio::test]
async fn test_global_datasource_is_upserted_once() {
    let harness = Harness::new(config());
    harness
        .cluster
        .global_datasources
        .lock()
        .unwrap()
        .insert("entitlements".to_string(), global_datasource());
    harness.cluster.put_secret(
        "platform",
        "entitlements-git",
        &[("username", "bot"), ("password", "hunter2")],
    );

    for _ in 0..2 {
        let result =
            reconcile_global_datasource(Arc::new(global_datasource()), Arc::clone(&harness.reconciler)).await;
        assert!(result.is_ok());
    }

    let das = &harness.das;
    assert_eq!(das.count("UpsertDatasource"), 1);
    let stored = das
        .datasources
        .lock()
        .unwrap()
        .get("global/entitlements")
        .cloned()
        .unwrap();
    assert_eq!(stored.type_, "pull");
    assert_eq!(stored.credentials, "global/entitlements/git");
    assert_eq!(stored.url, "https://git.example.com/platform/entitlements.git");
    assert_eq!(
        das.secrets.lock().unwrap().get("global/entitlements/git"),
        Some(&("bot".to_string(), "hunter2".to_string()))
    );
}

#[tokio::test]
async fn test_library_with_invalid_origin_url_fails() {
    let harness = Harness::new(config());
    let mut shared = library();
    if let Some(source_control) = shared.spec.source_control.as_mut() {
        source_control.library_origin.url = "https://git.example.com/{platform}/shared.git".to_string();
    }
    harness.cluster.put_library(shared);
    harness
        .cluster
        .put_secret(NAMESPACE, "git-creds", &[("name", "bot"), ("secret", "hunter2")]);

    assert!(!reconcile_shared(&harness).await);

    assert_eq!(harness.das.count("CreateUpdateSecret"), 0);
    assert_eq!(harness.das.count("UpsertLibrary"), 0);
    assert!(harness
        .cluster
        .event_reasons()
        .contains(&"FailedSyncLibrary".to_string()));
}

#[tokio::test]
async fn test_global_datasource_with_non_http_url_fails() {
    let harness = Harness::new(config());
    let mut datasource = global_datasource();
    datasource.spec.url = Some("ssh://git.example.com/platform/entitlements.git".to_string());
    harness
        .cluster
        .global_datasources
        .lock()
        .unwrap()
        .insert("entitlements".to_string(), datasource.clone());

    let result = reconcile_global_datasource(Arc::new(datasource), Arc::clone(&harness.reconciler)).await;

    assert!(result.is_err());
    assert_eq!(harness.das.count("UpsertDatasource"), 0);
    assert!(harness
        .cluster
        .event_reasons()
        .contains(&"FailedSyncGlobalDatasource".to_string()));
}
