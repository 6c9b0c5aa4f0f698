//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.

use crate::controller::reconciler::types::resource_key;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource to avoid cross-resource interference,
/// and reset by the reconciler on the next success.
pub fn handle_reconciliation_error<K>(obj: Arc<K>, error: &ReconcilerError, ctx: Arc<Reconciler>) -> Action
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    let kind = K::kind(&());
    let name = obj.name_any();
    let namespace = obj.namespace();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = kind.as_ref(),
        resource.name = name.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    let key = resource_key(&kind, namespace.as_deref(), &name);
    let (delay, error_count) = ctx.next_retry(&key);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(60));

    warn!("Reconciliation error for {} {}: {}", kind, name, error);
    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {})",
        delay.as_secs(),
        error_count
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s)",
        next_trigger_time.to_rfc3339(),
        delay.as_secs()
    );
    Action::requeue(delay)
}
