//! # Sidecar Configuration
//!
//! Base OPA and SLP configuration documents for a System. The user's
//! `customOPAConfig` is merged over the OPA document before rendering.

use super::derived::merge_values;
use crate::constants::{OPA_TOKEN_PATH, SLP_TOKEN_PATH};
use crate::provider::das::OpaConfig;
use serde_json::{json, Map, Value};

/// Names of the objects generated for a System
pub fn opa_token_secret_name(system: &str) -> String {
    format!("{system}-opa-token")
}

pub fn opa_config_map_name(system: &str) -> String {
    format!("{system}-opa")
}

pub fn slp_config_map_name(system: &str) -> String {
    format!("{system}-slp")
}

pub fn s3_credentials_secret_name(system: &str) -> String {
    format!("{system}-opa-s3")
}

fn discovery(system_id: &str) -> Value {
    json!({
        "name": "discovery",
        "service": "das",
        "resource": format!("/systems/{system_id}/discovery"),
    })
}

fn labels(opa: &OpaConfig) -> Value {
    json!({
        "system-id": opa.system_id,
        "system-type": opa.system_type,
    })
}

fn with_overlay(mut base: Value, overlay: Option<&Map<String, Value>>) -> Value {
    if let (Value::Object(base_map), Some(overlay)) = (&mut base, overlay) {
        merge_values(base_map, overlay);
    }
    base
}

/// OPA configuration for a System reconciled against DAS
///
/// With a local plane the sidecar talks to the SLP service, which holds the
/// token; otherwise it talks to DAS directly using the mounted token.
pub fn das_opa_config(
    opa: &OpaConfig,
    local_plane: Option<&str>,
    overlay: Option<&Map<String, Value>>,
) -> Value {
    let service = match local_plane {
        Some(slp) => json!({
            "name": "das",
            "url": format!("http://{slp}:8080/v1"),
        }),
        None => json!({
            "name": "das",
            "url": format!("{}/v1", opa.host_url),
            "credentials": {"bearer": {"token_path": OPA_TOKEN_PATH}},
        }),
    };
    let base = json!({
        "services": [service],
        "labels": labels(opa),
        "discovery": discovery(&opa.system_id),
    });
    with_overlay(base, overlay)
}

/// Configuration of the Styra local plane relaying to DAS
pub fn slp_config(opa: &OpaConfig) -> Value {
    json!({
        "services": [{
            "name": "das",
            "url": format!("{}/v1", opa.host_url),
            "credentials": {"bearer": {"token_path": SLP_TOKEN_PATH}},
        }],
        "labels": labels(opa),
        "discovery": discovery(&opa.system_id),
    })
}

/// Location of a System's bundle in object storage
pub struct BundleLocation<'a> {
    pub bucket_url: &'a str,
    pub bucket: &'a str,
    pub region: &'a str,
    pub key: &'a str,
}

/// OPA configuration for a System served from object storage by the
/// self-hosted control plane. Credentials come from the environment, fed by
/// the generated S3 Secret.
pub fn s3_opa_config(
    unique_name: &str,
    bundle: &BundleLocation<'_>,
    decision_logs_url: Option<&str>,
    overlay: Option<&Map<String, Value>>,
) -> Value {
    let mut services = vec![json!({
        "name": "s3",
        "url": format!("{}/{}", bundle.bucket_url.trim_end_matches('/'), bundle.bucket),
        "credentials": {"s3_signing": {"environment_credentials": {"aws_region": bundle.region}}},
    })];
    let mut base = json!({
        "labels": {"system-name": unique_name},
        "bundles": {
            unique_name: {
                "service": "s3",
                "resource": bundle.key,
            },
        },
    });
    if let Some(url) = decision_logs_url.filter(|u| !u.is_empty()) {
        services.push(json!({"name": "logs", "url": url}));
        base["decision_logs"] = json!({"service": "logs"});
    }
    base["services"] = Value::Array(services);
    with_overlay(base, overlay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opa() -> OpaConfig {
        OpaConfig {
            host_url: "https://tenant.das.example.com".to_string(),
            token: "tok".to_string(),
            system_id: "abc123".to_string(),
            system_type: "custom".to_string(),
        }
    }

    #[test]
    fn test_das_config_points_at_tenant() {
        let config = das_opa_config(&opa(), None, None);
        assert_eq!(config["services"][0]["url"], "https://tenant.das.example.com/v1");
        assert_eq!(
            config["services"][0]["credentials"]["bearer"]["token_path"],
            OPA_TOKEN_PATH
        );
        assert_eq!(config["discovery"]["resource"], "/systems/abc123/discovery");
        assert_eq!(config["labels"]["system-id"], "abc123");
    }

    #[test]
    fn test_das_config_with_local_plane_has_no_token() {
        let config = das_opa_config(&opa(), Some("slp-payments"), None);
        assert_eq!(config["services"][0]["url"], "http://slp-payments:8080/v1");
        assert!(config["services"][0].get("credentials").is_none());

        let slp = slp_config(&opa());
        assert_eq!(slp["services"][0]["credentials"]["bearer"]["token_path"], SLP_TOKEN_PATH);
    }

    #[test]
    fn test_overlay_wins() {
        let overlay = json!({
            "labels": {"team": "a"},
            "discovery": {"name": "custom"},
        });
        let config = das_opa_config(&opa(), None, overlay.as_object());
        assert_eq!(config["labels"]["team"], "a");
        assert_eq!(config["labels"]["system-id"], "abc123");
        assert_eq!(config["discovery"]["name"], "custom");
        assert_eq!(config["discovery"]["service"], "das");
    }

    #[test]
    fn test_s3_config() {
        let location = BundleLocation {
            bucket_url: "https://s3.example.com/",
            bucket: "bundles",
            region: "eu-west-1",
            key: "bundles/team-a-payments/bundle.tar.gz",
        };
        let config = s3_opa_config("team-a-payments", &location, None, None);
        assert_eq!(config["services"][0]["url"], "https://s3.example.com/bundles");
        assert_eq!(
            config["bundles"]["team-a-payments"]["resource"],
            "bundles/team-a-payments/bundle.tar.gz"
        );
        assert!(config.get("decision_logs").is_none());

        let config = s3_opa_config("team-a-payments", &location, Some("https://logs"), None);
        assert_eq!(config["services"][1]["url"], "https://logs");
        assert_eq!(config["decision_logs"]["service"], "logs");
    }
}
