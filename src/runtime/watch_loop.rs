//! # Watch Loop
//!
//! One kube-runtime controller per resource kind, run concurrently until a
//! shutdown signal. System owns the Secrets and ConfigMaps generated for it,
//! so edits to those trigger a reconcile of the owning System.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::{
    reconcile_global_datasource, reconcile_library, reconcile_system, Reconciler,
};
use crate::crd::{GlobalDatasource, Library, System};
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::server::ServerState;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Log the outcome of a reconcile from the controller stream
fn log_result<T: std::fmt::Debug, E: std::fmt::Display>(kind: &'static str) -> impl Fn(Result<T, E>) -> futures::future::Ready<()> {
    move |result| {
        match result {
            Ok(object) => debug!(resource.kind = kind, "watch.event.success: {:?}", object),
            Err(e) => warn!(resource.kind = kind, "Controller stream error: {}", e),
        }
        futures::future::ready(())
    }
}

/// Run the controllers until shutdown
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    let concurrency = controller_config.max_concurrent_reconciliations;
    let config = || controller::Config::default().concurrency(concurrency);
    info!("Starting controller watch loop (concurrency {})...", concurrency);

    let systems = Controller::new(
        Api::<System>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .owns(Api::<Secret>::all(client.clone()), watcher::Config::default())
    .owns(Api::<ConfigMap>::all(client.clone()), watcher::Config::default())
    .with_config(config())
    .shutdown_on_signal()
    .run(
        reconcile_system,
        handle_reconciliation_error::<System>,
        Arc::clone(&reconciler),
    )
    .for_each(log_result("System"));

    let libraries = Controller::new(
        Api::<Library>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .with_config(config())
    .shutdown_on_signal()
    .run(
        reconcile_library,
        handle_reconciliation_error::<Library>,
        Arc::clone(&reconciler),
    )
    .for_each(log_result("Library"));

    let global_datasources = Controller::new(
        Api::<GlobalDatasource>::all(client),
        watcher::Config::default().any_semantic(),
    )
    .with_config(config())
    .shutdown_on_signal()
    .run(
        reconcile_global_datasource,
        handle_reconciliation_error::<GlobalDatasource>,
        reconciler,
    )
    .for_each(log_result("GlobalDatasource"));

    server_state.set_controllers_running(true);
    futures::join!(systems, libraries, global_datasources);

    server_state.set_controllers_running(false);
    info!("Controller stopped gracefully");
    Ok(())
}
