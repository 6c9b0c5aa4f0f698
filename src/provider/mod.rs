//! # External API Clients
//!
//! Clients for the services a reconcile talks to:
//!
//! - [`das`] - the hosted policy-administration API
//! - [`ocp`] - the self-hosted OPA control plane (sources and bundles)
//! - [`s3`] - object-storage admin API used to provision bundle readers
//! - [`webhook`] - best-effort change notifications
//!
//! Every client is reached through a capability trait so reconcilers can be
//! exercised against in-memory fakes.

pub mod das;
pub mod ocp;
pub mod s3;
pub mod webhook;

mod rest;

pub use rest::RestClient;

use thiserror::Error;

/// Error returned by every external API client
///
/// Call sites branch on [`ClientError::is_not_found`], [`ClientError::is_conflict`]
/// and [`ClientError::is_server_error`], everything else is propagated.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{operation} failed with HTTP {status}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned an unexpected response: {message}")]
    Decode { operation: String, message: String },
}

impl ClientError {
    pub fn http(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        ClientError::Http {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn not_found(operation: impl Into<String>) -> Self {
        Self::http(operation, 404, "not found")
    }

    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}

/// Result type of the external API clients
pub type ClientResult<T> = Result<T, ClientError>;

/// Map a 404 to `None` for lookups where absence is an expected outcome
pub fn optional<T>(result: ClientResult<T>) -> ClientResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
