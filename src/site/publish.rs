use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use crate::error::{Error, Result};
use crate::services::ObjectStore;

pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Summary of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPage {
    pub bucket: String,
    pub object: String,
    pub bytes: usize,
}

/// Uploads rendered pages to a fixed bucket/object with `text/html` content type.
#[derive(Clone)]
pub struct SitePublisher {
    storage: Arc<dyn ObjectStore>,
    bucket: String,
    object: String,
}

impl SitePublisher {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    #[tracing::instrument(skip(self, html), fields(bucket = %self.bucket, object = %self.object))]
    pub async fn publish(&self, html: String) -> Result<PublishedPage> {
        let bytes = html.len();

        self.storage
            .put(&self.bucket, &self.object, Bytes::from(html), HTML_CONTENT_TYPE)
            .await
            .map_err(|e| Error::PublishFailed {
                bucket: self.bucket.clone(),
                object: self.object.clone(),
                reason: format!("{e:#}"),
            })?;

        info!(bytes, "Page published");
        Ok(PublishedPage {
            bucket: self.bucket.clone(),
            object: self.object.clone(),
            bytes,
        })
    }
}
