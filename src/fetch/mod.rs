//! HTTP plumbing shared by the Google Cloud REST clients.

pub mod auth;
mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;

/// Sends `req` and turns any non-2xx status into an error carrying the body.
pub async fn send_checked<C: HttpClient + ?Sized>(
    client: &C,
    req: reqwest::Request,
) -> Result<reqwest::Response> {
    let method = req.method().clone();
    let url = req.url().clone();

    let response = client
        .execute(req)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send {} {}: {}", method, redact(&url), e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!(
            "{} {} returned status {}: {}",
            method,
            redact(&url),
            status,
            body.trim()
        ));
    }

    Ok(response)
}

// Query strings may carry object names; the path is enough for diagnostics.
fn redact(url: &reqwest::Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}
