//! services/ad_client/src/adapters/http_beacon.rs
//!
//! This module contains the HTTP adapter for tracking beacons.
//! It implements the `BeaconSender` port from the `core` crate.

use ad_delivery_core::ports::{BeaconSender, PortError, PortResult};
use async_trait::async_trait;
use std::time::Duration;

/// An adapter that implements `BeaconSender` with a plain GET.
#[derive(Clone)]
pub struct HttpBeaconSender {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBeaconSender {
    /// Creates a new `HttpBeaconSender`.
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl BeaconSender for HttpBeaconSender {
    /// Loads the beacon URL. Any 2xx counts as loaded; the body is ignored.
    async fn fire(&self, url: &str) -> PortResult<()> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PortError::Unexpected(format!(
                "beacon returned status {}",
                response.status().as_u16()
            )))
        }
    }
}
