//! OPA System Controller Library
//!
//! This library provides the core functionality for the OPA System Controller:
//! reconciling `System`, `Library` and `GlobalDatasource` resources against
//! DAS or a self-hosted OPA control plane.
//!
//! ## Quick Start
//!
//! ```rust
//! use opa_system_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod server;
