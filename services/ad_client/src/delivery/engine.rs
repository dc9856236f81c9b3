//! services/ad_client/src/delivery/engine.rs
//!
//! The consumer-facing entry point. Composes the orchestrator with the three
//! trackers and the host page.

use crate::config::ClientOptions;
use crate::delivery::{
    click::ClickTracker,
    events::{DeliveryEvent, EventHandlers, EventKind},
    impression::ImpressionTracker,
    orchestrator::{RequestOrchestrator, RequestOverrides},
    session::ClientSession,
    viewability::{ViewabilityOutcome, ViewabilityTracker},
};
use crate::error::DeliveryError;
use crate::template::{format_ad, DefaultTemplate};
use ad_delivery_core::{
    AdInput, AdRecord, AdTemplate, BeaconSender, ContainerRef, ElementHandle, HostPage,
    IdentityStore, Transport, VisibilityObserver,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

/// Storage key of the anonymous user id.
pub const USER_ID_STORAGE_KEY: &str = "ad_client_user_id";

/// The capabilities the engine runs against.
#[derive(Clone)]
pub struct DeliveryPorts {
    pub transport: Arc<dyn Transport>,
    pub beacons: Arc<dyn BeaconSender>,
    pub page: Arc<dyn HostPage>,
    /// `None` when the host cannot observe visibility.
    pub visibility: Option<Arc<dyn VisibilityObserver>>,
    pub identity: Arc<dyn IdentityStore>,
}

/// A rendered ad and the trackers attached to it.
///
/// Dropping the handle cancels both trackers; `unmount` also waits for them to stop.
pub struct RenderedAd {
    element: ElementHandle,
    unmount: DropGuard,
    viewability: Option<JoinHandle<ViewabilityOutcome>>,
    clicks: Option<JoinHandle<()>>,
}

impl RenderedAd {
    pub fn element(&self) -> &ElementHandle {
        &self.element
    }

    pub fn is_tracking_viewability(&self) -> bool {
        self.viewability.is_some()
    }

    /// Waits for viewability tracking to end. `None` if it never started.
    pub async fn viewability_outcome(&mut self) -> Option<ViewabilityOutcome> {
        let handle = self.viewability.take()?;
        handle.await.ok()
    }

    /// Tears down both trackers. Call when the element leaves the page.
    pub async fn unmount(mut self) {
        let token = self.unmount.disarm();
        token.cancel();
        if let Some(handle) = self.viewability.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.clicks.take() {
            let _ = handle.await;
        }
    }
}

pub struct DeliveryEngine {
    session: Arc<ClientSession>,
    orchestrator: RequestOrchestrator,
    impressions: ImpressionTracker,
    viewability: ViewabilityTracker,
    clicks: ClickTracker,
    page: Arc<dyn HostPage>,
    template: Arc<dyn AdTemplate>,
    events: Arc<EventHandlers>,
}

impl DeliveryEngine {
    /// Creates a configured engine.
    ///
    /// A missing `api_key` is accepted here and reported by `request_ad`. The user
    /// id comes from `options.user_id` or else from the identity store.
    pub async fn configure(
        api_key: Option<String>,
        options: ClientOptions,
        ports: DeliveryPorts,
    ) -> Result<Self, DeliveryError> {
        let user_id = match options.user_id.clone() {
            Some(user_id) => user_id,
            None => ports
                .identity
                .get_or_create(USER_ID_STORAGE_KEY)
                .await
                .map_err(|e| {
                    DeliveryError::Configuration(format!("could not resolve a user id: {}", e))
                })?,
        };

        let session = Arc::new(ClientSession::new(
            api_key,
            user_id,
            options.platform.clone(),
            options.location.clone(),
            options.mode,
        ));
        if session.credential().is_err() {
            warn!("Ad client configured without an API key; requests will fail.");
        }

        let events = Arc::new(EventHandlers::new());
        let impressions = ImpressionTracker::new(ports.beacons.clone());
        let orchestrator = RequestOrchestrator::new(
            ports.transport,
            impressions.clone(),
            events.clone(),
            &options,
        );
        let viewability = ViewabilityTracker::new(ports.visibility, ports.beacons);
        let clicks = ClickTracker::new(ports.page.clone(), events.clone());

        info!(
            "Ad client configured for {} ({:?} mode).",
            options.api_base, options.mode
        );

        Ok(Self {
            session,
            orchestrator,
            impressions,
            viewability,
            clicks,
            page: ports.page,
            template: Arc::new(DefaultTemplate),
            events,
        })
    }

    /// Replaces the template `render` uses when no override is given.
    pub fn with_template(mut self, template: Arc<dyn AdTemplate>) -> Self {
        self.template = template;
        self
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Subscribes `handler` to one kind of event.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&DeliveryEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler);
    }

    /// Requests the best-matching ad, or `None` when the backend has nothing to show.
    ///
    /// Fails with `DeliveryError::Configuration` before any network call when the
    /// session has no credential.
    pub async fn request_ad(
        &self,
        input: impl Into<AdInput>,
        overrides: RequestOverrides,
    ) -> Result<Option<AdRecord>, DeliveryError> {
        self.session.credential()?;
        let mode = overrides.mode.unwrap_or(self.session.mode);
        let input = input.into();
        self.orchestrator
            .fetch_ad(&self.session, mode, &input, &overrides)
            .await
    }

    /// Renders `ad` into `container` and starts viewability and click tracking.
    ///
    /// Rendering no ad is a no-op that returns `Ok(None)`.
    pub fn render(
        &self,
        ad: Option<&AdRecord>,
        container: &ContainerRef,
        template: Option<&dyn AdTemplate>,
    ) -> Result<Option<RenderedAd>, DeliveryError> {
        let Some(ad) = ad else {
            debug!("No ad to render.");
            return Ok(None);
        };

        let target = self.page.resolve_container(container)?;
        let markup = match template {
            Some(template) => template.render(ad),
            None => self.template.render(ad),
        };
        let element = self.page.install_markup(&target, &markup)?;

        let unmount = CancellationToken::new();
        let viewability = self.viewability.attach(ad, &element, unmount.child_token());
        let clicks = self.clicks.attach(ad, &element, unmount.child_token());

        self.events.emit(DeliveryEvent::AdRendered {
            ad: ad.clone(),
            element: element.clone(),
        });
        info!("Rendered ad from '{}' into {}.", ad.advertiser, element.as_str());

        Ok(Some(RenderedAd {
            element,
            unmount: unmount.drop_guard(),
            viewability,
            clicks,
        }))
    }

    /// Waits until every impression beacon dispatched so far has loaded or failed.
    pub async fn flush_beacons(&self) {
        self.impressions.flush().await;
    }

    /// Formats `ad` with the default template.
    pub fn format_ad(&self, ad: &AdRecord) -> String {
        format_ad(ad)
    }
}
