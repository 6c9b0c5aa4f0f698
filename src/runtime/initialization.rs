//! # Initialization
//!
//! Controller initialization logic including rustls setup, configuration,
//! tracing, metrics, server startup, and client setup.

use crate::cluster::KubeCluster;
use crate::config::{ControllerConfig, ServerConfig, SharedControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::observability;
use crate::provider::das::{DasClient, WorkspaceOps};
use crate::provider::ocp::ControlPlaneClient;
use crate::provider::s3::ObjectStorageAdminClient;
use crate::provider::webhook::WebhookNotifier;
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::Client;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: SharedControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_listening", &self.server_state.is_listening())
            .finish_non_exhaustive()
    }
}

/// Set up the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("opa_system_controller={}", config.log_level)));
    let result = if config.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Configuration loading
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes and external API client creation
/// - Pushing workspace settings to DAS
pub async fn initialize(config_path: &Path) -> Result<InitializationResult> {
    // Configure rustls crypto provider FIRST, before any other operations
    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let config = ControllerConfig::load(config_path).context("Failed to load controller configuration")?;
    init_tracing(&config);

    info!("Starting OPA System Controller");
    info!(
        "Build info: timestamp={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_config = ServerConfig::from_env();

    // Start server in background task
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default().await?;
    let controller_config: SharedControllerConfig = Arc::new(config);

    let cluster = Arc::new(KubeCluster::new(client.clone()));
    let das = Arc::new(DasClient::new(&controller_config.das)?);
    let notifier = Arc::new(WebhookNotifier::new(
        controller_config.notification_webhooks.clone(),
    )?);
    let mut reconciler = Reconciler::new(
        cluster,
        Arc::clone(&das) as Arc<dyn crate::provider::das::DasApi>,
        notifier,
        Arc::clone(&controller_config),
    )?;

    let ocp_settings = &controller_config.opa_control_plane;
    if ocp_settings.enabled {
        info!("Self-hosted control plane enabled at {}", ocp_settings.address);
        let ocp = Arc::new(ControlPlaneClient::new(ocp_settings)?);
        let storage = Arc::new(ObjectStorageAdminClient::new(
            &ocp_settings.s3_admin,
            &ocp_settings.bucket_name,
        )?);
        reconciler = reconciler.with_control_plane(ocp, storage);
    }

    if let Some(workspace) = &controller_config.workspace {
        // Not fatal: the reconcilers don't depend on workspace settings
        match das.update_workspace(workspace).await {
            Ok(()) => info!("✅ Workspace settings pushed to DAS"),
            Err(e) => warn!("Failed to push workspace settings to DAS: {}", e),
        }
    }

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler: Arc::new(reconciler),
        server_state,
        controller_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout;
    let poll_interval = server_config.poll_interval;
    let start_time = std::time::Instant::now();

    loop {
        // Check if server task crashed
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_listening() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
    Ok(())
}
