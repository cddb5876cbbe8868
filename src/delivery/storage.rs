/*!
 * Artifact storage backends.
 *
 * `LocalArtifactStore` lays buckets out as directories under a root and signs
 * download links with SHA-256 over the object path and expiry.
 * `MemoryArtifactStore` keeps everything in a map and is used in tests.
 */

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use log::debug;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::errors::DeliveryError;
use crate::file_utils::FileManager;

use super::ArtifactStore;

/// Artifact store on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    link_base: Url,
    secret: String,
}

impl LocalArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P, link_base_url: &str, secret: &str) -> Result<Self, DeliveryError> {
        let link_base = Url::parse(link_base_url).map_err(|e| DeliveryError::Link(format!("{}: {}", link_base_url, e)))?;
        if link_base.cannot_be_a_base() {
            return Err(DeliveryError::Link(format!("{} cannot be used as a base URL", link_base_url)));
        }
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            link_base,
            secret: secret.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for an object; rejects keys that would escape the bucket
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, DeliveryError> {
        let mut path = self.root.join(checked_segment(bucket)?);
        for segment in key.split('/') {
            path.push(checked_segment(segment)?);
        }
        Ok(path)
    }

    fn signature(&self, bucket: &str, key: &str, expires: i64) -> String {
        let payload = format!("{}\n{}/{}\n{}", self.secret, bucket, key, expires);
        format!("{:x}", Sha256::digest(payload.as_bytes()))
    }

    /// Check a download link's expiry and signature
    pub fn verify_link(&self, bucket: &str, key: &str, expires: i64, signature: &str) -> bool {
        if Utc::now().timestamp() > expires {
            return false;
        }
        self.signature(bucket, key, expires) == signature
    }
}

fn checked_segment(segment: &str) -> Result<&str, DeliveryError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(segment),
        _ => Err(DeliveryError::Storage(format!("Invalid object path segment '{}'", segment))),
    }
}

fn io_error(bucket: &str, key: &str, error: std::io::Error) -> DeliveryError {
    if error.kind() == std::io::ErrorKind::NotFound {
        DeliveryError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        DeliveryError::Storage(format!("{}/{}: {}", bucket, key, error))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, DeliveryError> {
        let path = self.object_path(bucket, key)?;
        let content = tokio::fs::read(&path).await.map_err(|e| io_error(bucket, key, e))?;
        debug!("Fetched {}/{} ({} bytes)", bucket, key, content.len());
        Ok(Bytes::from(content))
    }

    async fn store(&self, bucket: &str, key: &str, content: Bytes) -> Result<(), DeliveryError> {
        let path = self.object_path(bucket, key)?;
        FileManager::write_atomic(&path, &content)
            .await
            .map_err(|e| DeliveryError::Storage(format!("{}/{}: {:#}", bucket, key, e)))?;
        debug!("Stored {}/{} ({} bytes)", bucket, key, content.len());
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, DeliveryError> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| DeliveryError::Storage(format!("{}/{}: {}", bucket, key, e)))
    }

    fn presign(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String, DeliveryError> {
        let expires_in = chrono::Duration::from_std(expires_in).map_err(|e| DeliveryError::Link(e.to_string()))?;
        let expires = (Utc::now() + expires_in).timestamp();

        let mut url = self.link_base.clone();
        url.path_segments_mut()
            .map_err(|_| DeliveryError::Link("Link base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(bucket, key, expires));

        debug!(
            "Signed link for {}/{} valid until {}",
            bucket,
            key,
            Utc.timestamp_opt(expires, 0).single().map(|t| t.to_rfc3339()).unwrap_or_default()
        );
        Ok(url.to_string())
    }
}

/// In-memory artifact store
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    objects: Arc<RwLock<HashMap<(String, String), Bytes>>>,
    fail_writes: bool,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes always fail
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, bucket: &str, key: &str, content: impl Into<Bytes>) {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), content.into());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects.read().get(&(bucket.to_string(), key.to_string())).cloned()
    }

    pub fn keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, DeliveryError> {
        self.get(bucket, key).ok_or_else(|| DeliveryError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn store(&self, bucket: &str, key: &str, content: Bytes) -> Result<(), DeliveryError> {
        if self.fail_writes {
            return Err(DeliveryError::Storage(format!("write to {}/{} rejected", bucket, key)));
        }
        self.insert(bucket, key, content);
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, DeliveryError> {
        Ok(self.get(bucket, key).is_some())
    }

    fn presign(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String, DeliveryError> {
        Ok(format!("memory://{}/{}?expires_in={}", bucket, key, expires_in.as_secs()))
    }
}
