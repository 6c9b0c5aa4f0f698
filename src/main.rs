//! # OPA System Controller
//!
//! Kubernetes controller that keeps `System`, `Library` and `GlobalDatasource`
//! resources in sync with DAS or a self-hosted OPA control plane.
//!
//! ## Startup
//!
//! 1. Load configuration from the YAML file given by `--config` / `CONFIG_FILE`
//! 2. Initialize tracing, metrics and the health/metrics HTTP server
//! 3. Build the Kubernetes, DAS and control-plane clients
//! 4. Run one controller per resource kind until SIGTERM/SIGINT

use anyhow::Result;
use clap::Parser;
use opa_system_controller::constants::DEFAULT_CONFIG_PATH;
use opa_system_controller::runtime::{initialize, run_watch_loop};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "opa-system-controller")]
#[command(about = "Reconciles OPA Systems, Libraries and GlobalDatasources", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the controller configuration file
    #[arg(long, env = "CONFIG_FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let init = initialize(&cli.config).await?;
    run_watch_loop(
        init.client,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await
}
