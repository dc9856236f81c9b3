//! services/ad_client/src/delivery/viewability.rs
//!
//! Tracks how long a rendered ad stays at least half visible and fires its
//! viewability beacon once the accumulated dwell reaches one second.

use ad_delivery_core::{AdRecord, BeaconSender, ElementHandle, VisibilityChange, VisibilityObserver};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Share of the element's area that must intersect the viewport.
pub const VISIBILITY_THRESHOLD: f64 = 0.5;
/// Accumulated visible time required before the beacon fires.
pub const DWELL_THRESHOLD: Duration = Duration::from_millis(1000);
/// Observation is abandoned this long after attachment if the beacon has not fired.
pub const OBSERVATION_CEILING: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewabilityState {
    Idle,
    Accumulating,
    Fired,
}

/// Dwell bookkeeping for one rendered element.
#[derive(Debug, Clone, Default)]
pub struct ViewabilitySession {
    accumulated: Duration,
    visible_since: Option<Duration>,
    fired: bool,
}

impl ViewabilitySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewabilityState {
        if self.fired {
            ViewabilityState::Fired
        } else if self.visible_since.is_some() {
            ViewabilityState::Accumulating
        } else {
            ViewabilityState::Idle
        }
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    /// Applies one observation. Returns `true` exactly once: on the visibility drop
    /// that brings the accumulated dwell to the threshold.
    pub fn observe(&mut self, change: VisibilityChange) -> bool {
        if self.fired {
            return false;
        }

        if change.ratio >= VISIBILITY_THRESHOLD {
            if self.visible_since.is_none() {
                self.visible_since = Some(change.time);
            }
            return false;
        }

        if let Some(start) = self.visible_since.take() {
            // Observations can arrive out of order; never subtract past zero.
            self.accumulated += change.time.saturating_sub(start);
        }
        if self.accumulated >= DWELL_THRESHOLD {
            self.fired = true;
            return true;
        }
        false
    }
}

/// How a viewability observation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewabilityOutcome {
    Fired,
    CeilingReached,
    Unmounted,
    ObserverClosed,
}

#[derive(Clone)]
pub struct ViewabilityTracker {
    observer: Option<Arc<dyn VisibilityObserver>>,
    beacons: Arc<dyn BeaconSender>,
}

impl ViewabilityTracker {
    pub fn new(observer: Option<Arc<dyn VisibilityObserver>>, beacons: Arc<dyn BeaconSender>) -> Self {
        Self { observer, beacons }
    }

    /// Starts observing `element` for `ad`.
    ///
    /// Returns `None` without doing anything when the ad has no viewability URL or
    /// the host cannot observe visibility. The observer is dropped when the beacon
    /// fires, when `unmount` is cancelled, or after `OBSERVATION_CEILING`.
    pub fn attach(
        &self,
        ad: &AdRecord,
        element: &ElementHandle,
        unmount: CancellationToken,
    ) -> Option<JoinHandle<ViewabilityOutcome>> {
        let viewability_url = ad.viewability_url.clone()?;

        let Some(observer) = self.observer.as_ref() else {
            debug!("Visibility observation unavailable; skipping viewability tracking.");
            return None;
        };
        let mut changes = match observer.observe(element, VISIBILITY_THRESHOLD) {
            Ok(changes) => changes,
            Err(e) => {
                debug!("Could not observe {}: {}", element.as_str(), e);
                return None;
            }
        };

        let beacons = self.beacons.clone();
        let element = element.clone();
        let deadline = tokio::time::Instant::now() + OBSERVATION_CEILING;

        Some(tokio::spawn(async move {
            let mut session = ViewabilitySession::new();
            let outcome = loop {
                tokio::select! {
                    biased;
                    _ = unmount.cancelled() => break ViewabilityOutcome::Unmounted,
                    _ = tokio::time::sleep_until(deadline) => break ViewabilityOutcome::CeilingReached,
                    change = changes.next() => match change {
                        Some(change) => {
                            if session.observe(change) {
                                break ViewabilityOutcome::Fired;
                            }
                        }
                        None => break ViewabilityOutcome::ObserverClosed,
                    },
                }
            };
            drop(changes);
            debug!("Viewability observer for {} disconnected: {:?}", element.as_str(), outcome);

            if outcome == ViewabilityOutcome::Fired {
                match beacons.fire(&viewability_url).await {
                    Ok(()) => info!(
                        "Viewable impression recorded after {:?}: {}",
                        session.accumulated(),
                        viewability_url
                    ),
                    Err(e) => error!("Viewability beacon failed for {}: {}", viewability_url, e),
                }
            }
            outcome
        }))
    }
}
