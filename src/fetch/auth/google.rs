use std::time::{Duration, Instant};

use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where Google OAuth access tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A fixed token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The compute metadata server of the runtime's service account.
    Metadata,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Option<Instant>,
}

/// An [`HttpClient`] wrapper that sends `Authorization: Bearer <token>` on
/// every request, fetching and refreshing the token as needed.
pub struct GoogleAuth<C> {
    inner: C,
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl<C: HttpClient> GoogleAuth<C> {
    pub fn new(inner: C, source: TokenSource) -> Self {
        Self {
            inner,
            source,
            cached: Mutex::new(None),
        }
    }

    async fn token(&self) -> reqwest::Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            let fresh = token.refresh_at.is_none_or(|at| Instant::now() < at);
            if fresh {
                return Ok(token.value.clone());
            }
        }

        let token = match &self.source {
            TokenSource::Static(value) => CachedToken {
                value: value.clone(),
                refresh_at: None,
            },
            TokenSource::Metadata => self.fetch_metadata_token().await?,
        };

        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_metadata_token(&self) -> reqwest::Result<CachedToken> {
        let req = reqwest::Client::new()
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .build()?;

        let response = self.inner.execute(req).await?.error_for_status()?;
        let token: TokenResponse = response.json().await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(expires_in = token.expires_in, "Fetched access token from metadata server");

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Some(Instant::now() + lifetime),
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for GoogleAuth<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let token = self.token().await?;

        // A token with characters illegal in a header is sent without auth;
        // the service then answers 401 with a readable error.
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                req.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => {
                warn!(error = %e, "Access token is not a valid header value; sending request without Authorization");
            }
        }
        self.inner.execute(req).await
    }
}
