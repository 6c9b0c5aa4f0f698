//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group for all custom resources owned by this controller
pub const API_GROUP: &str = "opa.controller.io";

/// Field manager / reporter name used for patches and events
pub const CONTROLLER_NAME: &str = "opa-system-controller";

/// Label selecting which controller instance handles a resource
pub const LABEL_CONTROLLER_CLASS: &str = "opa.controller.io/class";

/// Label selecting the control plane a System is reconciled against
pub const LABEL_CONTROL_PLANE: &str = "opa.controller.io/control-plane";

/// Value of [`LABEL_CONTROL_PLANE`] selecting the self-hosted control plane
pub const CONTROL_PLANE_OCP: &str = "opa-control-plane";

/// Value of [`LABEL_CONTROL_PLANE`] selecting DAS (also the default)
pub const CONTROL_PLANE_DAS: &str = "das";

/// Annotation carrying an existing DAS system ID to adopt
pub const ANNOTATION_MIGRATION_ID: &str = "opa.controller.io/migration-id";

/// Finalizer gating System deletion until external cleanup is done
pub const FINALIZER: &str = "opa.controller.io/finalizer";

/// Label put on every Secret/ConfigMap the controller generates
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Default HTTP server port for metrics and health checks
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default controller config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opa-system-controller/config.yaml";

/// Requeue interval after a successful reconciliation (seconds)
/// External state can drift without any Kubernetes event, so resync periodically
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Error backoff bounds (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Mount path of the OPA bearer token inside the sidecar
pub const OPA_TOKEN_PATH: &str = "/etc/opa/auth/token";

/// Mount path of the SLP bearer token inside the sidecar
pub const SLP_TOKEN_PATH: &str = "/etc/slp/auth/token";

/// Key of the token in the generated opa-token Secret
pub const OPA_TOKEN_KEY: &str = "token";

/// Key of the OPA configuration in the generated ConfigMap
pub const OPA_CONFIG_KEY: &str = "opa-conf.yaml";

/// Key of the SLP configuration in the generated ConfigMap
pub const SLP_CONFIG_KEY: &str = "slp.yaml";

/// Keys of the object-storage credentials Secret (self-hosted plane)
pub const S3_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const S3_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const S3_REGION: &str = "AWS_REGION";

/// Length of generated object-storage secret keys
pub const S3_SECRET_KEY_LENGTH: usize = 40;
