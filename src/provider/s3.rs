//! # Object Storage Admin API
//!
//! Provisions one read-only principal per System so an OPA sidecar can fetch
//! exactly its own bundle from the shared bucket.

use super::{optional, ClientResult, RestClient};
use crate::config::S3AdminConfig;
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use tracing::{info_span, Instrument};

const API: &str = "s3";

#[async_trait]
pub trait ObjectStorageAdmin: Send + Sync {
    async fn user_exists(&self, access_key: &str) -> ClientResult<bool>;
    /// Create a principal allowed to read `bundles/<unique_name>/*` only
    async fn create_system_bundle_user(
        &self,
        access_key: &str,
        secret_key: &str,
        unique_name: &str,
    ) -> ClientResult<()>;
    async fn set_new_user_secret_key(&self, access_key: &str, secret_key: &str) -> ClientResult<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest<'a> {
    secret_key: &'a str,
    policy: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetSecretRequest<'a> {
    secret_key: &'a str,
}

/// Read-only policy scoped to one System's bundle prefix
pub fn bundle_read_policy(bucket: &str, unique_name: &str) -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{bucket}/bundles/{unique_name}/*")]
        }]
    })
}

#[derive(Debug, Clone)]
pub struct ObjectStorageAdminClient {
    rest: RestClient,
    bucket: String,
}

impl ObjectStorageAdminClient {
    pub fn new(config: &S3AdminConfig, bucket: &str) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestClient::with_basic_auth(API, &config.url, &config.access_key, &config.secret_key)?,
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStorageAdmin for ObjectStorageAdminClient {
    async fn user_exists(&self, access_key: &str) -> ClientResult<bool> {
        let rb = self
            .rest
            .request(Method::GET, &format!("/admin/users/{access_key}"));
        let found = optional(
            self.rest
                .send("UserExists", rb)
                .instrument(info_span!("s3.user.exists"))
                .await,
        )?;
        Ok(found.is_some())
    }

    async fn create_system_bundle_user(
        &self,
        access_key: &str,
        secret_key: &str,
        unique_name: &str,
    ) -> ClientResult<()> {
        let body = CreateUserRequest {
            secret_key,
            policy: bundle_read_policy(&self.bucket, unique_name),
        };
        let rb = self
            .rest
            .request(Method::PUT, &format!("/admin/users/{access_key}"))
            .json(&body);
        self.rest
            .send_empty("CreateSystemBundleUser", rb)
            .instrument(info_span!("s3.user.create", system.unique_name = unique_name))
            .await
    }

    async fn set_new_user_secret_key(&self, access_key: &str, secret_key: &str) -> ClientResult<()> {
        let body = SetSecretRequest { secret_key };
        let rb = self
            .rest
            .request(Method::PUT, &format!("/admin/users/{access_key}/secret"))
            .json(&body);
        self.rest
            .send_empty("SetNewUserSecretKey", rb)
            .instrument(info_span!("s3.user.rotate"))
            .await
    }
}
