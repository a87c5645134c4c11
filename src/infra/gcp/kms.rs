use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::fetch::{HttpClient, send_checked};
use crate::services::{CryptoKeyName, KeyManagementService};

const KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com";

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(default)]
    plaintext: Option<String>,
}

/// [`KeyManagementService`] backed by the Cloud KMS REST API.
pub struct CloudKms<C> {
    client: C,
    endpoint: String,
}

impl<C: HttpClient> CloudKms<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            endpoint: KMS_ENDPOINT.to_string(),
        }
    }

    fn decrypt_url(&self, key: &CryptoKeyName) -> Result<Url> {
        Url::parse(&format!("{}/v1/{}:decrypt", self.endpoint, key))
            .with_context(|| format!("invalid KMS key name '{key}'"))
    }
}

#[async_trait::async_trait]
impl<C: HttpClient> KeyManagementService for CloudKms<C> {
    async fn decrypt(&self, key: &CryptoKeyName, ciphertext: &[u8]) -> Result<Vec<u8>> {
        trace!(key = %key, ciphertext_len = ciphertext.len(), "decrypting with Cloud KMS");

        let body = serde_json::to_vec(&DecryptRequest {
            ciphertext: STANDARD.encode(ciphertext),
        })?;

        let mut req = Request::new(Method::POST, self.decrypt_url(key)?);
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());

        let response = send_checked(&self.client, req)
            .await
            .context("Cloud KMS decrypt failed")?;

        let decrypted: DecryptResponse = response
            .json()
            .await
            .context("Failed to parse Cloud KMS decrypt response")?;

        // The API omits `plaintext` entirely when it is empty.
        let plaintext = match decrypted.plaintext {
            Some(encoded) => STANDARD
                .decode(encoded)
                .context("Cloud KMS returned invalid base64 plaintext")?,
            None => Vec::new(),
        };

        trace!(plaintext_len = plaintext.len(), "decrypted with Cloud KMS");
        Ok(plaintext)
    }
}
