//! Pub/Sub push endpoint.
//!
//! Each push is one invocation of the [`SiteJob`]. The message payload and
//! attributes are not used; a push is just a signal to rebuild the page. A
//! non-2xx response makes the subscription redeliver, so redelivery policy
//! lives entirely in Pub/Sub.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{Instrument, error, info, warn};

use crate::job::SiteJob;

/// Body Pub/Sub POSTs to a push subscription.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PubsubMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    /// Base64 payload, ignored by the job.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub publish_time: Option<DateTime<Utc>>,
}

pub fn router(job: Arc<SiteJob>) -> Router {
    Router::new()
        .route("/", post(handle_push))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(job)
}

async fn handle_push(State(job): State<Arc<SiteJob>>, body: Bytes) -> Response {
    let envelope: PushEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Rejected malformed push envelope");
            return (StatusCode::BAD_REQUEST, format!("invalid push envelope: {e}"))
                .into_response();
        }
    };

    let span = tracing::info_span!(
        "pubsub_push",
        message_id = envelope.message.message_id.as_deref().unwrap_or(""),
        subscription = envelope.subscription.as_deref().unwrap_or(""),
        publish_time = ?envelope.message.publish_time,
    );

    match job.run().instrument(span).await {
        Ok(page) => {
            info!(bucket = %page.bucket, object = %page.object, bytes = page.bytes, "Push handled");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(error = %e, "Site update failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serves the push endpoint until Ctrl+C or SIGTERM.
pub async fn serve(job: Arc<SiteJob>, addr: SocketAddr) -> anyhow::Result<()> {
    let shutdown = shutdown_signal()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening for Pub/Sub pushes");

    axum::serve(listener, router(job))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM. The SIGTERM handler is installed
/// by this call, before the returned future is polled.
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        #[cfg(unix)]
        let terminate = async move {
            term.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Ctrl+C received, shutting down"),
            _ = terminate => info!("SIGTERM received, shutting down"),
        }
    })
}
