//! # Git Credentials
//!
//! Credentials for a repository come from a Secret named on the resource or,
//! failing that, from the controller configuration by longest URL prefix.
//! A repository without credentials is not an error; syncing is skipped.

use crate::cluster::ClusterApi;
use crate::config::GitCredential;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Username and password pushed to DAS as a git secret, wiped on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct GitAuth {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitAuth")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl From<&GitCredential> for GitAuth {
    fn from(credential: &GitCredential) -> Self {
        Self {
            user: credential.user.clone(),
            password: credential.password.clone(),
        }
    }
}

/// Pick the credential with the longest prefix of `repo_url`
///
/// Ties keep configuration order.
pub fn resolve<'a>(credentials: &'a [GitCredential], repo_url: &str) -> Option<&'a GitCredential> {
    let mut candidates: Vec<&GitCredential> = credentials.iter().collect();
    // sort_by is stable
    candidates.sort_by(|a, b| b.repo_prefix.len().cmp(&a.repo_prefix.len()));
    candidates
        .into_iter()
        .find(|c| repo_url.starts_with(c.repo_prefix.as_str()))
}

/// Read `user_key`/`password_key` from a credentials Secret
///
/// A missing Secret fails with "could not find credentials Secret", which is
/// reported as a user error.
pub async fn read_credentials_secret(
    cluster: &dyn ClusterApi,
    namespace: &str,
    name: &str,
    user_key: &str,
    password_key: &str,
) -> Result<GitAuth> {
    let Some(data) = cluster.get_secret_data(namespace, name).await? else {
        anyhow::bail!("could not find credentials Secret {namespace}/{name}");
    };
    let secret = format!("{namespace}/{name}");
    Ok(GitAuth {
        user: secret_field(&data, &secret, user_key)?,
        password: secret_field(&data, &secret, password_key)?,
    })
}

fn secret_field(data: &BTreeMap<String, Vec<u8>>, secret: &str, key: &str) -> Result<String> {
    let bytes = data
        .get(key)
        .with_context(|| format!("credentials Secret {secret} has no '{key}' key"))?;
    String::from_utf8(bytes.clone())
        .with_context(|| format!("credentials Secret {secret} key '{key}' is not UTF-8"))
}

/// Credentials for `repo_url`: the explicit Secret when named, else the
/// configured default
pub async fn resolve_git_auth(
    cluster: &dyn ClusterApi,
    defaults: &[GitCredential],
    namespace: &str,
    secret_name: Option<&str>,
    repo_url: &str,
) -> Result<Option<GitAuth>> {
    if let Some(secret_name) = secret_name.filter(|s| !s.is_empty()) {
        return read_credentials_secret(cluster, namespace, secret_name, "name", "secret")
            .await
            .map(Some);
    }
    let resolved = resolve(defaults, repo_url).map(GitAuth::from);
    if resolved.is_none() {
        debug!(repo.url = repo_url, "No git credentials configured for repository");
    }
    Ok(resolved)
}
