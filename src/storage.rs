//! Object storage for staging source images before provider dispatch.
//!
//! Images are uploaded to an S3-compatible bucket under a key derived from
//! the original file name, with collision avoidance so concurrent uploads of
//! equally-named files never overwrite each other.

use crate::error::{Result, VideogenError};
use bytes::Bytes;
use object_store::aws::{AmazonS3Builder, Checksum};
use object_store::path::Path as ObjPath;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_ENDPOINT: &str = "https://s3.tebi.io";

/// Shared handle to any object-store backend.
pub type DynStore = Arc<dyn ObjectStore>;

/// A successfully staged image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Object key within the bucket.
    pub key: String,
    /// Publicly reachable URL for the object.
    pub url: String,
}

/// Builder for `ImageStore`.
#[derive(Debug, Clone, Default)]
pub struct ImageStoreBuilder {
    access_key: Option<String>,
    secret_key: Option<String>,
    bucket: Option<String>,
    endpoint: Option<String>,
}

impl ImageStoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the access key. Falls back to `TEBI_ACCESS_KEY` env var.
    pub fn access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }

    /// Sets the secret key. Falls back to `TEBI_SECRET_KEY` env var.
    pub fn secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(key.into());
        self
    }

    /// Sets the bucket name. Falls back to `TEBI_BUCKET` env var.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the S3 endpoint. Falls back to `TEBI_ENDPOINT` env var, then to
    /// the Tebi default.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Builds the store, resolving credentials from the environment where
    /// not set explicitly.
    pub fn build(self) -> Result<ImageStore> {
        let access_key = self
            .access_key
            .or_else(|| std::env::var("TEBI_ACCESS_KEY").ok())
            .ok_or_else(|| {
                VideogenError::Auth("TEBI_ACCESS_KEY not set and no access key provided".into())
            })?;
        let secret_key = self
            .secret_key
            .or_else(|| std::env::var("TEBI_SECRET_KEY").ok())
            .ok_or_else(|| {
                VideogenError::Auth("TEBI_SECRET_KEY not set and no secret key provided".into())
            })?;
        let bucket = self
            .bucket
            .or_else(|| std::env::var("TEBI_BUCKET").ok())
            .ok_or_else(|| {
                VideogenError::Auth("TEBI_BUCKET not set and no bucket provided".into())
            })?;
        let endpoint = self
            .endpoint
            .or_else(|| std::env::var("TEBI_ENDPOINT").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let store = AmazonS3Builder::new()
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_bucket_name(&bucket)
            .with_endpoint(endpoint)
            .with_region("auto")
            .with_checksum_algorithm(Checksum::SHA256)
            .build()?;

        Ok(ImageStore {
            store: Arc::new(store),
            bucket,
        })
    }
}

/// Image staging storage backed by an S3-compatible object store.
#[derive(Clone, Debug)]
pub struct ImageStore {
    store: DynStore,
    bucket: String,
}

impl ImageStore {
    /// Creates a new `ImageStoreBuilder`.
    pub fn builder() -> ImageStoreBuilder {
        ImageStoreBuilder::new()
    }

    /// Creates an `ImageStore` over a custom backend. Useful for tests.
    pub fn with_backend(store: DynStore, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Uploads a local image file and returns its key and public URL.
    ///
    /// The object key starts as the source file name; if an object with that
    /// key already exists the key is suffixed with the current Unix timestamp
    /// and an increasing counter until a free key is found.
    ///
    /// Transport integrity is enforced by the store itself: backends built by
    /// [`ImageStoreBuilder`] send a SHA-256 checksum the S3 endpoint verifies
    /// server-side, and a mismatch fails the put as a storage error. The
    /// digest attached here as object metadata is advisory, an audit trail
    /// for later readers; nothing in the upload path checks it.
    pub async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VideogenError::InvalidRequest(format!(
                    "image file not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Err(VideogenError::InvalidRequest(format!(
                "image file is empty: {}",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                VideogenError::InvalidRequest(format!(
                    "image path has no usable file name: {}",
                    path.display()
                ))
            })?
            .to_string();

        let checksum = sha256_hex(&data);
        let key = self.unique_key(&file_name).await?;

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::Metadata("checksum-sha256".into()),
            AttributeValue::from(checksum.clone()),
        );
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&ObjPath::from(key.as_str()), PutPayload::from_bytes(Bytes::from(data)), opts)
            .await?;

        let url = format!("https://{}/{}", self.bucket, key);
        tracing::info!(key = %key, checksum = %checksum, "uploaded image to object storage");

        Ok(UploadedAsset { key, url })
    }

    /// Checks whether an object exists at the given key.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = ObjPath::from(key);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Finds a key that does not collide with an existing object.
    ///
    /// The original file name is tried first; on collision, `-<ts>-<n>` is
    /// inserted before the extension, with `n` counting up from 1.
    async fn unique_key(&self, file_name: &str) -> Result<String> {
        if !self.exists(file_name).await? {
            return Ok(file_name.to_string());
        }

        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
            None => (file_name.to_string(), String::new()),
        };
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut counter = 1u32;
        loop {
            let candidate = format!("{stem}-{ts}-{counter}{ext}");
            if !self.exists(&candidate).await? {
                return Ok(candidate);
            }
            counter += 1;
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
