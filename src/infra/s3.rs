use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use crate::services::ObjectStore;

/// [`ObjectStore`] backed by Amazon S3.
///
/// Uses the ambient AWS configuration (env vars, instance profile, etc.)
/// loaded by `aws_config::load_from_env`.
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    #[tracing::instrument(skip(self))]
    async fn get(&self, bucket: &str, object: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await
            .with_context(|| format!("S3 GetObject failed for s3://{bucket}/{object}"))?;

        let body = resp
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of s3://{bucket}/{object}"))?;

        Ok(body.into_bytes())
    }

    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, bucket: &str, object: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(object)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("S3 PutObject failed for s3://{bucket}/{object}"))?;

        Ok(())
    }
}
