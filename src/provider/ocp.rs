//! # OPA Control Plane API
//!
//! Sources describe where policy and data come from, bundles describe what is
//! built from which sources and where the result is stored.

use super::{ClientResult, RestClient};
use crate::config::OpaControlPlaneConfig;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

const API: &str = "ocp";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<SourceGit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGit {
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub source: String,
}

impl Requirement {
    pub fn source(name: impl Into<String>) -> Self {
        Self {
            source: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub name: String,
    pub object_storage: ObjectStorage,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorage {
    pub aws: S3Location,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Missing sources are an `Http` 404
    async fn get_source(&self, name: &str) -> ClientResult<Source>;
    async fn put_source(&self, source: &Source) -> ClientResult<()>;
    /// Fails with a 500 while a bundle still references the source
    async fn delete_source(&self, name: &str) -> ClientResult<()>;
    async fn put_bundle(&self, bundle: &Bundle) -> ClientResult<()>;
    async fn delete_bundle(&self, name: &str) -> ClientResult<()>;
}

#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    rest: RestClient,
}

impl ControlPlaneClient {
    pub fn new(config: &OpaControlPlaneConfig) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestClient::new(API, &config.address, &config.token)?,
        })
    }
}

#[async_trait]
impl ControlPlaneApi for ControlPlaneClient {
    async fn get_source(&self, name: &str) -> ClientResult<Source> {
        async {
            let rb = self.rest.request(Method::GET, &format!("/v1/sources/{name}"));
            let envelope: Envelope<Source> = self.rest.send_json("GetSource", rb).await?;
            Ok(envelope.result)
        }
        .instrument(info_span!("ocp.source.get", source.name = name))
        .await
    }

    async fn put_source(&self, source: &Source) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::PUT, &format!("/v1/sources/{}", source.name))
            .json(source);
        self.rest
            .send_empty("PutSource", rb)
            .instrument(info_span!("ocp.source.put", source.name = source.name.as_str()))
            .await
    }

    async fn delete_source(&self, name: &str) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::DELETE, &format!("/v1/sources/{name}"));
        self.rest
            .send_empty("DeleteSource", rb)
            .instrument(info_span!("ocp.source.delete", source.name = name))
            .await
    }

    async fn put_bundle(&self, bundle: &Bundle) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::PUT, &format!("/v1/bundles/{}", bundle.name))
            .json(bundle);
        self.rest
            .send_empty("PutBundle", rb)
            .instrument(info_span!("ocp.bundle.put", bundle.name = bundle.name.as_str()))
            .await
    }

    async fn delete_bundle(&self, name: &str) -> ClientResult<()> {
        let rb = self
            .rest
            .request(Method::DELETE, &format!("/v1/bundles/{name}"));
        self.rest
            .send_empty("DeleteBundle", rb)
            .instrument(info_span!("ocp.bundle.delete", bundle.name = name))
            .await
    }
}
