//! # Reconciler
//!
//! Core reconciliation logic for `System`, `Library` and `GlobalDatasource`
//! resources.
//!
//! The reconciler:
//! - Resolves or creates the external system in DAS, or the sources and
//!   bundle on the self-hosted control plane
//! - Syncs git credentials, subjects (role bindings) and datasources
//! - Generates the sidecar token Secret and configuration ConfigMaps
//! - Records phase, readiness and per-phase Conditions in status
//!
//! ## Reconciliation Flow (System)
//!
//! 1. Re-read the resource and check the controller class
//! 2. Handle deletion (finalizer-gated teardown)
//! 3. Ensure the finalizer
//! 4. Run the control plane's ordered phases, stopping at the first failure
//! 5. Update status

pub mod conditions;
pub mod credentials;
pub mod datasources;
pub mod derived;
pub mod error;
pub mod global_datasource;
pub mod library;
pub mod s3_credentials;
pub mod sidecar;
pub mod subjects;
pub mod system;
pub mod types;
pub mod user_cache;
pub mod validation;

// Re-export public API
pub use conditions::{ConditionType, Conditions};
pub use error::{is_user_error, EventReason, ReconcileError};
pub use global_datasource::reconcile_global_datasource;
pub use library::reconcile_library;
pub use system::reconcile_system;
pub use types::{BackoffState, ControlPlaneHandles, Reconciler, ReconcilerError};
