use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use url::Url;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("missing storage configuration: {0}")]
    ConfigMissing(&'static str),
    #[error("invalid public base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("object store unavailable: {0}")]
    ProviderUnavailable(String),
}

#[derive(Debug, Clone, Default)]
pub struct PutOpts {
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Object storage for recipe images
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, opts: PutOpts) -> Result<StoredObject, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    base_url: Url,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>, base_url: Url) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            base_url,
        }
    }

    /// Loads AWS credentials from the environment and targets the configured bucket.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, BlobError> {
        let bucket = config
            .bucket
            .clone()
            .ok_or(BlobError::ConfigMissing("S3_BUCKET_NAME"))?;
        let base_url = public_base_url(config, &bucket)?;

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Ok(Self::new(Client::new(&sdk_config), bucket, base_url))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Bytes, opts: PutOpts) -> Result<StoredObject, BlobError> {
        let content_type = opts
            .content_type
            .unwrap_or_else(|| "application/octet-stream".into());

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type);

        for (k, v) in opts.metadata {
            request = request.metadata(k, v);
        }

        request.send().await.map_err(|err| {
            BlobError::ProviderUnavailable(format!("put_object failed: {err}"))
        })?;

        Ok(StoredObject {
            key: key.to_string(),
            url: object_url(&self.base_url, key)?,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                BlobError::ProviderUnavailable(format!("delete_object failed: {err}"))
            })?;
        Ok(())
    }
}

/// Keeps objects in process. Used when no bucket is configured and by the tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, (Bytes, PutOpts)>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn metadata(&self, key: &str) -> Option<HashMap<String, String>> {
        self.objects.get(key).map(|entry| entry.value().1.metadata.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, body: Bytes, opts: PutOpts) -> Result<StoredObject, BlobError> {
        self.objects.insert(key.to_string(), (body, opts));
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{key}"),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.objects.remove(key);
        Ok(())
    }
}

fn public_base_url(config: &StorageConfig, bucket: &str) -> Result<Url, BlobError> {
    let raw = match &config.public_base_url {
        Some(url) => url.clone(),
        None => format!("https://{}.s3.{}.amazonaws.com/", bucket, config.region),
    };
    // Url::join drops the last path segment unless the base ends in '/'
    let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
    Url::parse(&raw).map_err(|err| BlobError::InvalidBaseUrl(err.to_string()))
}

fn object_url(base: &Url, key: &str) -> Result<String, BlobError> {
    base.join(key)
        .map(String::from)
        .map_err(|err| BlobError::InvalidBaseUrl(err.to_string()))
}
