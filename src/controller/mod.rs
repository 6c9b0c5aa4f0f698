//! # Controller
//!
//! Core controller modules for the OPA System Controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `reconciler`: Core reconciliation logic

pub mod backoff;
pub mod reconciler;
