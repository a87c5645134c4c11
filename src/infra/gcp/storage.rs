use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use tracing::debug;

use crate::fetch::{HttpClient, send_checked};
use crate::services::ObjectStore;

const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// [`ObjectStore`] backed by the Cloud Storage JSON API.
pub struct GcsStore<C> {
    client: C,
    endpoint: String,
}

impl<C: HttpClient> GcsStore<C> {
    pub fn new(client: C) -> Self {
        Self::with_endpoint(client, STORAGE_ENDPOINT)
    }

    /// Points the store at another endpoint, e.g. a local storage emulator.
    pub fn with_endpoint(client: C, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, bucket: &str, object: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid storage endpoint '{}'", self.endpoint))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("storage endpoint cannot be a base URL"))?
            .extend(["storage", "v1", "b", bucket, "o", object]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn upload_url(&self, bucket: &str, object: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid storage endpoint '{}'", self.endpoint))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("storage endpoint cannot be a base URL"))?
            .extend(["upload", "storage", "v1", "b", bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl<C: HttpClient> ObjectStore for GcsStore<C> {
    #[tracing::instrument(skip(self))]
    async fn get(&self, bucket: &str, object: &str) -> Result<Bytes> {
        let req = Request::new(Method::GET, self.object_url(bucket, object)?);
        let response = send_checked(&self.client, req)
            .await
            .with_context(|| format!("Cloud Storage download of gs://{bucket}/{object} failed"))?;

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Downloaded object");
        Ok(body)
    }

    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, bucket: &str, object: &str, body: Bytes, content_type: &str) -> Result<()> {
        let mut req = Request::new(Method::POST, self.upload_url(bucket, object)?);
        req.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .with_context(|| format!("invalid content type '{content_type}'"))?,
        );
        *req.body_mut() = Some(body.into());

        send_checked(&self.client, req)
            .await
            .with_context(|| format!("Cloud Storage upload to gs://{bucket}/{object} failed"))?;

        Ok(())
    }
}
