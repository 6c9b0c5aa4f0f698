//! # Controller Configuration
//!
//! Settings loaded from the controller config file, with environment overrides
//! for credentials so they can be injected from Secrets.

use crate::controller::reconciler::validation::validate_url;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Controller-level configuration
///
/// # Example
///
/// ```yaml
/// controllerClass: ""
/// deletionProtectionDefault: true
/// systemPrefix: "dev-"
/// systemUserRoles: ["SystemViewer"]
/// das:
///   address: https://tenant.das.example.com
/// sso:
///   identityProvider: azure-ad
///   jwtGroupsClaim: groups
/// gitCredentials:
///   - user: bot
///     password: s3cr3t
///     repoPrefix: https://git.example.com/
/// datasourceIgnorePatterns: ["^systems/[^/]+/kubernetes/.*"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Only resources whose class label equals this value are reconciled
    pub controller_class: String,
    /// Deletion protection for Systems that don't set it explicitly
    pub deletion_protection_default: bool,
    /// Create DAS systems as read-only (managed from git only)
    pub read_only: bool,
    /// Honour the migration-id annotation when a System has no ID yet
    pub enable_migrations: bool,
    pub system_prefix: String,
    pub system_suffix: String,
    /// Roles granted to the subjects declared on a System or Library
    pub system_user_roles: Vec<String>,
    pub das: DasConfig,
    /// SSO settings; group subjects are dropped when unset
    pub sso: Option<SsoConfig>,
    /// Default git credentials, matched by longest repository prefix
    pub git_credentials: Vec<GitCredential>,
    /// Observed datasources whose ID matches any of these are never deleted
    pub datasource_ignore_patterns: Vec<String>,
    pub notification_webhooks: NotificationWebhooks,
    /// User directory cache lifetime. Unset keeps entries until invalidated.
    pub user_cache_ttl_secs: Option<u64>,
    pub opa_control_plane: OpaControlPlaneConfig,
    /// Workspace settings pushed to DAS once at startup
    pub workspace: Option<serde_json::Value>,
    /// Global log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Maximum concurrent reconciliations per resource kind
    pub max_concurrent_reconciliations: u16,
    /// Requeue interval after a successful reconcile (seconds)
    pub resync_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DasConfig {
    pub address: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SsoConfig {
    pub identity_provider: String,
    pub jwt_groups_claim: String,
}

/// Git credential applied to every repository URL starting with `repo_prefix`
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GitCredential {
    pub user: String,
    pub password: String,
    pub repo_prefix: String,
}

impl std::fmt::Debug for GitCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredential")
            .field("user", &self.user)
            .field("password", &"***")
            .field("repo_prefix", &self.repo_prefix)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationWebhooks {
    pub system_datasource_changed: Option<String>,
    pub library_datasource_changed: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OpaControlPlaneConfig {
    pub enabled: bool,
    pub address: String,
    pub token: String,
    pub bucket_name: String,
    pub bucket_region: String,
    pub bucket_url: String,
    /// Sources every System bundle requires in addition to its own
    pub default_requirements: Vec<String>,
    /// Decision log endpoint written into the sidecar configuration
    pub decision_logs_url: Option<String>,
    pub s3_admin: S3AdminConfig,
}

#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct S3AdminConfig {
    pub url: String,
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for S3AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3AdminConfig")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_class: String::new(),
            deletion_protection_default: false,
            read_only: true,
            enable_migrations: false,
            system_prefix: String::new(),
            system_suffix: String::new(),
            system_user_roles: vec!["SystemViewer".to_string()],
            das: DasConfig::default(),
            sso: None,
            git_credentials: Vec::new(),
            datasource_ignore_patterns: Vec::new(),
            notification_webhooks: NotificationWebhooks::default(),
            user_cache_ttl_secs: None,
            opa_control_plane: OpaControlPlaneConfig::default(),
            workspace: None,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            max_concurrent_reconciliations: 10,
            resync_interval_secs: crate::constants::DEFAULT_RESYNC_INTERVAL_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    ///
    /// A missing file yields the defaults so the controller can run from
    /// environment variables alone.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_yaml_str(&raw)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::warn!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Invalid controller configuration")
    }

    /// Credentials are usually mounted from Secrets as environment variables
    fn apply_env_overrides(&mut self) {
        if let Some(token) = super::env_var_opt("DAS_TOKEN") {
            self.das.token = token;
        }
        if let Some(address) = super::env_var_opt("DAS_ADDRESS") {
            self.das.address = address;
        }
        if let Some(token) = super::env_var_opt("OCP_TOKEN") {
            self.opa_control_plane.token = token;
        }
        if let Some(secret) = super::env_var_opt("S3_ADMIN_SECRET_KEY") {
            self.opa_control_plane.s3_admin.secret_key = secret;
        }
        if let Some(level) = super::env_var_opt("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(format) = super::env_var_opt("LOG_FORMAT") {
            self.log_format = format;
        }
    }

    /// Reject configuration that would make every reconcile fail
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.das.address).context("das.address")?;
        if self.opa_control_plane.enabled {
            validate_url(&self.opa_control_plane.address).context("opaControlPlane.address")?;
            validate_url(&self.opa_control_plane.bucket_url).context("opaControlPlane.bucketUrl")?;
            if self.opa_control_plane.bucket_name.is_empty() {
                anyhow::bail!("opaControlPlane.bucketName is required when the control plane is enabled");
            }
        }
        self.ignore_patterns()?;
        Ok(())
    }

    /// Compiled datasource ignore patterns
    pub fn ignore_patterns(&self) -> Result<Vec<Regex>> {
        self.datasource_ignore_patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid datasource ignore pattern '{p}'")))
            .collect()
    }

    pub fn user_cache_ttl(&self) -> Option<Duration> {
        self.user_cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}
