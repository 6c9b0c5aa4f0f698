//! # Controller Configuration
//!
//! Controller-level configuration is loaded once at startup from a YAML file
//! (mounted from a ConfigMap) with secrets overridable from environment
//! variables. HTTP server settings come from the environment only.

mod controller;
mod server;

pub use controller::{
    ControllerConfig, DasConfig, GitCredential, NotificationWebhooks, OpaControlPlaneConfig,
    S3AdminConfig, SsoConfig,
};
pub use server::ServerConfig;

use std::sync::Arc;

/// Controller configuration shared by all reconcilers
pub type SharedControllerConfig = Arc<ControllerConfig>;

/// Read environment variable as a non-empty string
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
