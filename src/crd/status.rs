//! # System Status
//!
//! Status types for tracking reconciliation state and conditions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of the System resource
///
/// Only the controller writes this. `ready` and `phase` summarise the last
/// reconcile, `conditions` record each phase independently.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    /// External system ID (DAS system ID, or unique name on the self-hosted plane)
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub phase: SystemPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
pub enum SystemPhase {
    #[default]
    Pending,
    Created,
    Failed,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
