//! services/ad_client/src/delivery/impression.rs
//!
//! Fires the impression pixel of a delivered ad, at most once per pixel URL.

use crate::delivery::session::ClientSession;
use ad_delivery_core::{AdRecord, BeaconSender};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct ImpressionTracker {
    beacons: Arc<dyn BeaconSender>,
    tasks: TaskTracker,
}

impl ImpressionTracker {
    pub fn new(beacons: Arc<dyn BeaconSender>) -> Self {
        Self {
            beacons,
            tasks: TaskTracker::new(),
        }
    }

    /// Waits for every beacon dispatched so far to settle.
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Dispatches the impression beacon for `ad` without waiting for it.
    ///
    /// The pixel is reserved before this returns, so any later delivery of the same
    /// pixel URL is a no-op. Returns the beacon task, or `None` when nothing was sent.
    pub fn fire_once(&self, session: &Arc<ClientSession>, ad: &AdRecord) -> Option<JoinHandle<()>> {
        let Some(pixel_url) = ad.pixel_url.clone() else {
            debug!("Ad from '{}' has no impression pixel.", ad.advertiser);
            return None;
        };

        if !session.fired_pixels.try_reserve(&pixel_url) {
            debug!("Impression already fired for {}", pixel_url);
            return None;
        }

        let beacons = self.beacons.clone();
        let session = session.clone();
        Some(self.tasks.spawn(async move {
            match beacons.fire(&pixel_url).await {
                Ok(()) => {
                    session.fired_pixels.confirm(&pixel_url);
                    info!("Impression recorded: {}", pixel_url);
                }
                Err(e) => {
                    // Released so a later delivery of the same ad may try again.
                    session.fired_pixels.release(&pixel_url);
                    error!("Impression beacon failed for {}: {}", pixel_url, e);
                }
            }
        }))
    }
}
