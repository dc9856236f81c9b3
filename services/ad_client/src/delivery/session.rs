//! services/ad_client/src/delivery/session.rs
//!
//! Defines the per-client session: credential, identity, request defaults and the
//! set of impression pixels already beaconed.

use crate::error::DeliveryError;
use ad_delivery_core::RequestMode;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Pixel URLs this session has beaconed, or is beaconing right now.
///
/// A URL is reserved before its beacon is sent, confirmed once the beacon loads
/// and released if it fails. A reserved or confirmed URL is never reserved again.
#[derive(Debug, Default)]
pub struct FiredPixelSet {
    inner: Mutex<PixelState>,
}

#[derive(Debug, Default)]
struct PixelState {
    fired: HashSet<String>,
    in_flight: HashSet<String>,
}

impl FiredPixelSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PixelState> {
        // The state is two sets; a panic mid-update cannot leave it inconsistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims `url` for a beacon. Returns `false` if it was already fired or is in flight.
    pub fn try_reserve(&self, url: &str) -> bool {
        let mut state = self.state();
        if state.fired.contains(url) || state.in_flight.contains(url) {
            return false;
        }
        state.in_flight.insert(url.to_string())
    }

    pub fn confirm(&self, url: &str) {
        let mut state = self.state();
        state.in_flight.remove(url);
        state.fired.insert(url.to_string());
    }

    pub fn release(&self, url: &str) {
        self.state().in_flight.remove(url);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.state().fired.contains(url)
    }

    pub fn len(&self) -> usize {
        self.state().fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The state shared by every call made through one configured client.
#[derive(Debug)]
pub struct ClientSession {
    api_key: Option<String>,
    pub user_id: String,
    pub platform: String,
    pub location: String,
    pub mode: RequestMode,
    pub fired_pixels: FiredPixelSet,
}

impl ClientSession {
    pub fn new(
        api_key: Option<String>,
        user_id: String,
        platform: String,
        location: String,
        mode: RequestMode,
    ) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            user_id,
            platform,
            location,
            mode,
            fired_pixels: FiredPixelSet::new(),
        }
    }

    /// The API credential, or the configuration error raised when it is missing.
    pub fn credential(&self) -> Result<&str, DeliveryError> {
        self.api_key.as_deref().ok_or_else(|| {
            DeliveryError::Configuration("an API key is required to request ads".to_string())
        })
    }
}
