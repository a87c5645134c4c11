//! Trait for reading and writing whole objects in a bucket.

use anyhow::Result;
use bytes::Bytes;

/// Abstraction over a blob store (e.g., Cloud Storage, S3).
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Downloads the full contents of `bucket/object`.
    ///
    /// A missing object is an error, never an empty body.
    async fn get(&self, bucket: &str, object: &str) -> Result<Bytes>;

    /// Uploads `body` to `bucket/object`, replacing any existing object.
    async fn put(&self, bucket: &str, object: &str, body: Bytes, content_type: &str)
    -> Result<()>;
}
