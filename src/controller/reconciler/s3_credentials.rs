//! # Object-Storage Credentials
//!
//! Each System on the self-hosted plane gets an object-storage principal that
//! can only read its own bundle. The access key is derived from the bucket and
//! the System's unique name, so it is stable across reconciles. The secret key
//! is generated once and kept in the System's S3 Secret; it is rotated only
//! when that Secret is lost.

use super::sidecar::s3_credentials_secret_name;
use super::types::Reconciler;
use crate::cluster::DerivedKind;
use crate::constants::{S3_ACCESS_KEY_ID, S3_SECRET_ACCESS_KEY, S3_SECRET_KEY_LENGTH};
use crate::crd::System;
use crate::provider::s3::ObjectStorageAdmin;
use anyhow::{Context, Result};
use kube::ResourceExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

const ACCESS_KEY_LENGTH: usize = 20;

/// Credentials the sidecar uses to download its bundle
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct StorageCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// Deterministic access key for `unique_name` in `bucket`
pub fn access_key_for(bucket: &str, unique_name: &str) -> String {
    let digest = Sha256::digest(format!("{bucket}/{unique_name}").as_bytes());
    let hex = format!("{digest:x}");
    hex[..ACCESS_KEY_LENGTH].to_uppercase()
}

pub fn generate_secret_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(S3_SECRET_KEY_LENGTH)
        .map(char::from)
        .collect()
}

impl Reconciler {
    /// Ensure the System's storage principal exists and return its credentials
    pub(crate) async fn provision_storage_credentials(
        &self,
        storage: &dyn ObjectStorageAdmin,
        system: &System,
        unique_name: &str,
    ) -> Result<StorageCredentials> {
        let bucket = &self.config.opa_control_plane.bucket_name;
        let access_key = access_key_for(bucket, unique_name);
        let namespace = system.namespace().unwrap_or_default();
        let secret_name = s3_credentials_secret_name(&system.name_any());

        if !storage
            .user_exists(&access_key)
            .await
            .context("Failed to look up storage principal")?
        {
            info!(system.unique_name = unique_name, "Creating storage principal for bundle access");
            let secret_key = generate_secret_key();
            storage
                .create_system_bundle_user(&access_key, &secret_key, unique_name)
                .await
                .context("Failed to create storage principal")?;
            return Ok(StorageCredentials {
                access_key,
                secret_key,
            });
        }

        let stored = self
            .cluster
            .get_derived(DerivedKind::Secret, &namespace, &secret_name)
            .await?
            .and_then(|secret| {
                let key_id = secret.data.get(S3_ACCESS_KEY_ID)?.clone();
                let secret_key = secret.data.get(S3_SECRET_ACCESS_KEY)?.clone();
                Some((String::from_utf8(key_id).ok()?, String::from_utf8(secret_key).ok()?))
            })
            .filter(|(key_id, secret_key)| key_id == &access_key && !secret_key.is_empty());

        if let Some((_, secret_key)) = stored {
            return Ok(StorageCredentials {
                access_key,
                secret_key,
            });
        }

        info!(
            system.unique_name = unique_name,
            "Stored storage credentials missing, rotating secret key"
        );
        let secret_key = generate_secret_key();
        storage
            .set_new_user_secret_key(&access_key, &secret_key)
            .await
            .context("Failed to rotate storage secret key")?;
        Ok(StorageCredentials {
            access_key,
            secret_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_key_is_deterministic() {
        let a = access_key_for("bundles", "team-a-payments");
        assert_eq!(a, access_key_for("bundles", "team-a-payments"));
        assert_eq!(a.len(), ACCESS_KEY_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(a, access_key_for("bundles", "team-b-payments"));
        assert_ne!(a, access_key_for("other", "team-a-payments"));
    }

    #[test]
    fn test_generated_secret_key() {
        let key = generate_secret_key();
        assert_eq!(key.len(), S3_SECRET_KEY_LENGTH);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, generate_secret_key());
    }
}
