//! # Runtime
//!
//! Controller startup, watch loop and error handling.
//!
//! - `initialization`: rustls, configuration, tracing, metrics, server and clients
//! - `watch_loop`: the kube-runtime controllers for all three resource kinds
//! - `error_policy`: per-resource backoff after failed reconciles

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
