//! services/ad_client/src/delivery/click.rs
//!
//! Routes activations of tracked links through the ad's click-tracking redirect.

use crate::delivery::events::{DeliveryEvent, EventHandlers};
use ad_delivery_core::{AdRecord, ElementHandle, HostPage, LinkActivation, NavigationOptions};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Links carrying this attribute are intercepted.
pub const TRACKED_LINK_SELECTOR: &str = "a[data-ad-track]";

#[derive(Clone)]
pub struct ClickTracker {
    page: Arc<dyn HostPage>,
    events: Arc<EventHandlers>,
}

impl ClickTracker {
    pub fn new(page: Arc<dyn HostPage>, events: Arc<EventHandlers>) -> Self {
        Self { page, events }
    }

    /// The URL an activation should open: the tracking redirect when the ad has one,
    /// otherwise the link's own href.
    pub fn resolve_target(ad: &AdRecord, activation: &LinkActivation) -> String {
        ad.click_url
            .clone()
            .unwrap_or_else(|| activation.href.clone())
    }

    /// Intercepts tracked links under `root` until `unmount` is cancelled.
    pub fn attach(
        &self,
        ad: &AdRecord,
        root: &ElementHandle,
        unmount: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let mut activations = match self.page.intercept_links(root, TRACKED_LINK_SELECTOR) {
            Ok(activations) => activations,
            Err(e) => {
                error!("Could not attach click tracking to {}: {}", root.as_str(), e);
                return None;
            }
        };
        if ad.click_url.is_none() {
            debug!("Ad from '{}' has no click URL; clicks will not be tracked.", ad.advertiser);
        }

        let page = self.page.clone();
        let events = self.events.clone();
        let ad = ad.clone();

        Some(tokio::spawn(async move {
            loop {
                // Activations queued before unmount are still honored.
                let activation = tokio::select! {
                    biased;
                    activation = activations.next() => match activation {
                        Some(activation) => activation,
                        None => break,
                    },
                    _ = unmount.cancelled() => break,
                };

                let target = Self::resolve_target(&ad, &activation);
                events.emit(DeliveryEvent::AdClicked {
                    ad: ad.clone(),
                    element: activation.element.clone(),
                });
                info!("Ad clicked; opening {}", target);
                if let Err(e) = page.navigate(&target, NavigationOptions::isolated()).await {
                    error!("Navigation to {} failed: {}", target, e);
                }
            }
        }))
    }
}
