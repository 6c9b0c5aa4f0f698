//! # Custom Resource Definitions
//!
//! CRD types for the OPA System Controller.
//!
//! ## Module Structure
//!
//! - `system.rs` - `System`, one policy-enforcement unit and its sidecar settings
//! - `library.rs` - `Library`, a shared policy bundle with its own access control
//! - `global_datasource.rs` - `GlobalDatasource`, a cluster-wide datasource
//! - `common.rs` - Types shared by several resources (subjects, datasources, git origins)
//! - `status.rs` - Status types for tracking reconciliation state

mod common;
mod global_datasource;
mod library;
mod status;
mod system;

pub use common::{preserve_unknown_fields, Datasource, GitRepo, SecretRef, Subject, SubjectKind};
pub use global_datasource::{GlobalDatasource, GlobalDatasourceSpec};
pub use library::{Library, LibrarySourceControl, LibrarySpec};
pub use status::{Condition, SystemPhase, SystemStatus};
pub(crate) use system::class_matches;
pub use system::{
    AllowedMapping, ColumnMapping, ControlPlane, DecisionMapping, ExpectedValue, LocalPlane,
    ReasonMapping, SourceControl, System, SystemSpec,
};
