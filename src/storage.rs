use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("couldn't read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("upload of {key} failed: {reason}")]
    UploadFailed { key: String, reason: String },
    #[error("delete of {key} failed: {reason}")]
    DeleteFailed { key: String, reason: String },
}

/// Object storage for uploaded videos.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload the file at `path` under `key` in a single request.
    async fn put_object(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// `endpoint_url` points at an S3-compatible provider (MinIO and the
    /// like); path-style addressing is used for those.
    pub async fn new(bucket: String, region: String, endpoint_url: Option<String>) -> Self {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let client = match endpoint_url {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&config),
        };

        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let size = body.size_hint().0;
        let start = Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            })?;

        info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        info!(bucket = %self.bucket, key = %key, "S3 object deleted");
        Ok(())
    }
}
