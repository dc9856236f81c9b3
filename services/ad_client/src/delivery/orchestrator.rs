//! services/ad_client/src/delivery/orchestrator.rs
//!
//! Builds ad requests, drives the retry loop over the transport and turns the
//! backend's answer into a single ad or an explicit "no ad" result.

use crate::config::ClientOptions;
use crate::delivery::{
    events::{DeliveryEvent, EventHandlers},
    impression::ImpressionTracker,
    session::ClientSession,
};
use crate::error::DeliveryError;
use ad_delivery_core::{
    AdInput, AdRecord, AdRequestPayload, AdResponse, RequestMode, Transport, TransportRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-call overrides of the session defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOverrides {
    pub mode: Option<RequestMode>,
    pub user_id: Option<String>,
    pub platform: Option<String>,
    pub location: Option<String>,
}

impl RequestOverrides {
    pub fn with_mode(mode: RequestMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }
}

pub struct RequestOrchestrator {
    transport: Arc<dyn Transport>,
    impressions: ImpressionTracker,
    events: Arc<EventHandlers>,
    api_base: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl RequestOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        impressions: ImpressionTracker,
        events: Arc<EventHandlers>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            transport,
            impressions,
            events,
            api_base: options.api_base.trim_end_matches('/').to_string(),
            timeout: options.timeout,
            max_retries: options.max_retries,
            retry_delay: options.retry_delay,
        }
    }

    pub fn endpoint(&self, mode: RequestMode) -> String {
        format!("{}{}", self.api_base, mode.endpoint_path())
    }

    /// Requests one ad.
    ///
    /// Transient failures are retried up to `max_retries` times with a linear
    /// backoff of `retry_delay * (attempt + 1)`. Only the first ad of a non-empty
    /// answer is kept, and its impression is dispatched before it is returned.
    pub async fn fetch_ad(
        &self,
        session: &Arc<ClientSession>,
        mode: RequestMode,
        input: &AdInput,
        overrides: &RequestOverrides,
    ) -> Result<Option<AdRecord>, DeliveryError> {
        let api_key = session.credential()?;
        let request = TransportRequest {
            endpoint: self.endpoint(mode),
            api_key: api_key.to_string(),
            payload: build_payload(session, mode, input, overrides),
            timeout: self.timeout,
        };

        let mut attempt: u32 = 0;
        loop {
            match self.transport.send(&request).await {
                Ok(response) => return Ok(self.select(session, response)),
                Err(e) if attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_delay, attempt);
                    warn!(
                        "Ad request attempt {} of {} failed: {}. Retrying in {:?}.",
                        attempt.saturating_add(1),
                        self.max_retries.saturating_add(1),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Ad request failed after {} attempt(s): {}",
                        attempt.saturating_add(1),
                        e
                    );
                    let err = DeliveryError::from(e);
                    self.events.emit(DeliveryEvent::Error(err.clone()));
                    return Err(err);
                }
            }
        }
    }

    fn select(&self, session: &Arc<ClientSession>, response: AdResponse) -> Option<AdRecord> {
        let first = response.ads.and_then(|ads| ads.into_iter().next());
        match first {
            Some(ad) => {
                info!("Ad loaded from '{}'.", ad.advertiser);
                self.impressions.fire_once(session, &ad);
                self.events.emit(DeliveryEvent::AdLoaded(ad.clone()));
                Some(ad)
            }
            None => {
                info!("No ad available for this request.");
                self.events.emit(DeliveryEvent::NoAd);
                None
            }
        }
    }
}

/// Wait before the retry that follows failed attempt number `attempt` (0-based).
pub fn backoff_delay(retry_delay: Duration, attempt: u32) -> Duration {
    retry_delay.saturating_mul(attempt.saturating_add(1))
}

/// Builds the mode-specific request body.
pub fn build_payload(
    session: &ClientSession,
    mode: RequestMode,
    input: &AdInput,
    overrides: &RequestOverrides,
) -> AdRequestPayload {
    let text = input.text_for(mode).map(str::to_string);
    let (user_prompt, agent_response) = match mode {
        RequestMode::UserQuery => (text, None),
        RequestMode::AgentResponse => (None, text),
    };

    AdRequestPayload {
        user_prompt,
        agent_response,
        user_id: overrides
            .user_id
            .clone()
            .unwrap_or_else(|| session.user_id.clone()),
        platform: overrides
            .platform
            .clone()
            .unwrap_or_else(|| session.platform.clone()),
        location: overrides
            .location
            .clone()
            .unwrap_or_else(|| session.location.clone()),
    }
}
