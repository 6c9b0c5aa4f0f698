//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use opa_system_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (System, Library, GlobalDatasource, etc.)
//! - External API traits (DasApi, ControlPlaneApi, ObjectStorageAdmin, Notifier)
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - Config types (ControllerConfig, ServerConfig)

// CRD types - most commonly used
pub use crate::crd::*;

// Cluster and external API seams - needed for alternative implementations
pub use crate::cluster::{ClusterApi, KubeCluster};
pub use crate::provider::das::{DasApi, DasClient};
pub use crate::provider::ocp::{ControlPlaneApi, ControlPlaneClient};
pub use crate::provider::s3::{ObjectStorageAdmin, ObjectStorageAdminClient};
pub use crate::provider::webhook::{Notifier, WebhookNotifier};
pub use crate::provider::{ClientError, ClientResult};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile_global_datasource, reconcile_library, reconcile_system, BackoffState,
    ReconcileError, Reconciler, ReconcilerError,
};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, ServerConfig, SharedControllerConfig};
