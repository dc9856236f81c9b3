//! In-process stand-ins for the delivery ports.

#![allow(dead_code)]

use ad_client_lib::adapters::{HeadlessPage, MemoryIdentityStore};
use ad_client_lib::config::ClientOptions;
use ad_client_lib::delivery::{DeliveryEngine, DeliveryEvent, DeliveryPorts, EventKind};
use ad_delivery_core::{
    AdRecord, AdResponse, BeaconSender, ElementHandle, PortError, PortResult, Transport,
    TransportError, TransportRequest, VisibilityChange, VisibilityObserver,
};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{BoxStream, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

//=========================================================================================
// Scripted Transport
//=========================================================================================

/// Replays scripted results, repeating the last one once the script runs out.
pub struct FakeTransport {
    script: Mutex<VecDeque<Result<AdResponse, TransportError>>>,
    last: Mutex<Option<Result<AdResponse, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    pub fn new(script: Vec<Result<AdResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &TransportRequest) -> Result<AdResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = Some(next);
        }
        (*last)
            .clone()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted response".to_string())))
    }
}

//=========================================================================================
// Recording Beacons
//=========================================================================================

/// Records every beacon; URLs in `failing` fail until removed.
#[derive(Default)]
pub struct FakeBeacons {
    fired: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeBeacons {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn recover(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    pub fn fired(&self) -> Vec<String> {
        self.fired.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.fired().iter().filter(|fired| fired.as_str() == url).count()
    }
}

#[async_trait]
impl BeaconSender for FakeBeacons {
    async fn fire(&self, url: &str) -> PortResult<()> {
        self.fired.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            Err(PortError::Unexpected(format!("{} unreachable", url)))
        } else {
            Ok(())
        }
    }
}

//=========================================================================================
// Synthetic Visibility
//=========================================================================================

/// Hands out channel-backed streams and lets tests push observations into them.
#[derive(Default)]
pub struct FakeVisibility {
    observers: Mutex<Vec<(ElementHandle, mpsc::UnboundedSender<VisibilityChange>)>>,
    refusing: AtomicBool,
}

impl FakeVisibility {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every later `observe` call fail.
    pub fn refuse(&self) {
        self.refusing.store(true, Ordering::SeqCst);
    }

    /// Pushes an observation to the most recently attached observer.
    pub fn emit(&self, ms: u64, ratio: f64) {
        let observers = self.observers.lock().unwrap();
        let (_, sender) = observers.last().expect("no observer attached");
        let _ = sender.unbounded_send(VisibilityChange {
            ratio,
            time: Duration::from_millis(ms),
        });
    }

    pub fn observed(&self) -> Vec<ElementHandle> {
        self.observers
            .lock()
            .unwrap()
            .iter()
            .map(|(element, _)| element.clone())
            .collect()
    }

    /// Whether the most recent observer has been disconnected.
    pub fn disconnected(&self) -> bool {
        let observers = self.observers.lock().unwrap();
        observers
            .last()
            .map(|(_, sender)| sender.is_closed())
            .unwrap_or(true)
    }
}

impl VisibilityObserver for FakeVisibility {
    fn observe(
        &self,
        element: &ElementHandle,
        threshold: f64,
    ) -> PortResult<BoxStream<'static, VisibilityChange>> {
        assert_eq!(threshold, 0.5);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected(format!(
                "cannot observe {}",
                element.as_str()
            )));
        }
        let (sender, receiver) = mpsc::unbounded();
        self.observers.lock().unwrap().push((element.clone(), sender));
        Ok(receiver.boxed())
    }
}

//=========================================================================================
// Engine Harness
//=========================================================================================

pub const SLOT: &str = "#ad-slot";

pub struct Harness {
    pub engine: DeliveryEngine,
    pub transport: Arc<FakeTransport>,
    pub beacons: Arc<FakeBeacons>,
    pub page: Arc<HeadlessPage>,
    pub visibility: Arc<FakeVisibility>,
    pub events: Arc<Mutex<Vec<DeliveryEvent>>>,
}

impl Harness {
    pub fn events_of(&self, kind: EventKind) -> Vec<DeliveryEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.kind() == kind)
            .cloned()
            .collect()
    }
}

pub fn options() -> ClientOptions {
    ClientOptions {
        api_base: "https://ads.test".to_string(),
        retry_delay: Duration::from_millis(100),
        user_id: Some("user-1".to_string()),
        ..ClientOptions::default()
    }
}

pub async fn harness(
    api_key: Option<&str>,
    options: ClientOptions,
    script: Vec<Result<AdResponse, TransportError>>,
    with_visibility: bool,
) -> Harness {
    let transport = FakeTransport::new(script);
    let beacons = FakeBeacons::new();
    let page = Arc::new(HeadlessPage::new());
    page.add_container(SLOT);
    let visibility = FakeVisibility::new();

    let ports = DeliveryPorts {
        transport: transport.clone(),
        beacons: beacons.clone(),
        page: page.clone(),
        visibility: if with_visibility {
            Some(visibility.clone() as Arc<dyn VisibilityObserver>)
        } else {
            None
        },
        identity: Arc::new(MemoryIdentityStore::new()),
    };
    let engine = DeliveryEngine::configure(api_key.map(str::to_string), options, ports)
        .await
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::AdLoaded,
        EventKind::NoAd,
        EventKind::Error,
        EventKind::AdRendered,
        EventKind::AdClicked,
    ] {
        let events = events.clone();
        engine.on(kind, move |event| events.lock().unwrap().push(event.clone()));
    }

    Harness {
        engine,
        transport,
        beacons,
        page,
        visibility,
        events,
    }
}

pub fn ad(advertiser: &str) -> AdRecord {
    let slug = advertiser.to_lowercase();
    AdRecord {
        content: format!("{} has what you need", advertiser),
        advertiser: advertiser.to_string(),
        click_url: Some(format!("https://track.test/click/{}", slug)),
        pixel_url: Some(format!("https://track.test/pixel/{}", slug)),
        viewability_url: Some(format!("https://track.test/view/{}", slug)),
        url: Some(format!("https://{}.test", slug)),
        ..AdRecord::default()
    }
}

pub fn ads(ads: Vec<AdRecord>) -> Result<AdResponse, TransportError> {
    let total = ads.len() as u64;
    Ok(AdResponse {
        ads: Some(ads),
        total: Some(total),
    })
}

pub fn unavailable() -> Result<AdResponse, TransportError> {
    Err(TransportError::Http {
        status: 503,
        message: "backend unavailable".to_string(),
    })
}
