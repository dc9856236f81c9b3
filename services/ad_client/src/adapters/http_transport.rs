//! services/ad_client/src/adapters/http_transport.rs
//!
//! This module contains the HTTP adapter for the ad-serving backend.
//! It implements the `Transport` port from the `core` crate.

use ad_delivery_core::{AdResponse, Transport, TransportError, TransportRequest};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Header carrying the API credential.
pub const API_KEY_HEADER: &str = "x-api-key";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `Transport` with a single timed JSON POST.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

/// Best-effort shape of an error body.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpTransport {
    /// Creates a new `HttpTransport`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send_inner(&self, request: &TransportRequest) -> Result<AdResponse, TransportError> {
        let response = self
            .client
            .post(&request.endpoint)
            .header(API_KEY_HEADER, &request.api_key)
            .json(&request.payload)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Reading or parsing the error body must never mask the status.
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.message)
                .unwrap_or_else(|| fallback_message(status));
            return Err(TransportError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<AdResponse>()
            .await
            .map_err(|e| TransportError::Network(format!("invalid response body: {}", e)))
    }
}

fn fallback_message(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("Request failed with status {} ({})", status.as_u16(), reason),
        None => format!("Request failed with status {}", status.as_u16()),
    }
}

//=========================================================================================
// `Transport` Trait Implementation
//=========================================================================================

#[async_trait]
impl Transport for HttpTransport {
    /// Posts the payload, abandoning the request once `request.timeout` elapses.
    async fn send(&self, request: &TransportRequest) -> Result<AdResponse, TransportError> {
        debug!("POST {}", request.endpoint);
        match tokio::time::timeout(request.timeout, self.send_inner(request)).await {
            Ok(result) => result,
            // Dropping the inner future aborts the in-flight request.
            Err(_) => Err(TransportError::Timeout {
                timeout_ms: request.timeout.as_millis() as u64,
            }),
        }
    }
}
