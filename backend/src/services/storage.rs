//! Attachment blob storage on MinIO or any S3-compatible endpoint.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};

use crate::config::Config;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Creates the bucket when it does not exist yet.
    async fn ensure_bucket(&self) -> anyhow::Result<()>;
}

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            config.minio_access_key.clone(),
            config.minio_secret_key.clone(),
            None,
            None,
            "incidex-config",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.minio_region.clone()))
            .endpoint_url(config.minio_endpoint_url())
            .credentials_provider(credentials)
            .load()
            .await;
        // MinIO serves buckets by path, not by virtual host.
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.minio_bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| anyhow!("failed to upload {}: {}", key, DisplayErrorContext(err)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| anyhow!("failed to download {}: {}", key, DisplayErrorContext(err)))?;
        let data = object
            .body
            .collect()
            .await
            .with_context(|| format!("failed to read object body for {}", key))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| anyhow!("failed to delete {}: {}", key, DisplayErrorContext(err)))?;
        Ok(())
    }

    async fn ensure_bucket(&self) -> anyhow::Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| {
                anyhow!(
                    "failed to create bucket {}: {}",
                    self.bucket,
                    DisplayErrorContext(err)
                )
            })?;
        tracing::info!(bucket = %self.bucket, "Created attachment bucket");
        Ok(())
    }
}

/// Process-local storage used by tests and storage-less deployments.
#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| anyhow!("object {} not found", key))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }

    async fn ensure_bucket(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
