//! services/ad_client/src/delivery/events.rs
//!
//! Typed notifications raised over the delivery lifecycle.

use crate::error::DeliveryError;
use ad_delivery_core::{AdRecord, ElementHandle};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// The names a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AdLoaded,
    NoAd,
    Error,
    AdRendered,
    AdClicked,
}

/// A notification and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    AdLoaded(AdRecord),
    NoAd,
    Error(DeliveryError),
    AdRendered { ad: AdRecord, element: ElementHandle },
    AdClicked { ad: AdRecord, element: ElementHandle },
}

impl DeliveryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DeliveryEvent::AdLoaded(_) => EventKind::AdLoaded,
            DeliveryEvent::NoAd => EventKind::NoAd,
            DeliveryEvent::Error(_) => EventKind::Error,
            DeliveryEvent::AdRendered { .. } => EventKind::AdRendered,
            DeliveryEvent::AdClicked { .. } => EventKind::AdClicked,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&DeliveryEvent) + Send + Sync>;

/// Listener lists, one per event kind. Handlers run synchronously in
/// registration order on the task that raised the event.
#[derive(Default)]
pub struct EventHandlers {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&DeliveryEvent) + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    pub fn emit(&self, event: DeliveryEvent) {
        // Clone the list out so a handler may subscribe without deadlocking.
        let listeners: Vec<EventHandler> = {
            let handlers = self
                .handlers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            handlers.get(&event.kind()).cloned().unwrap_or_default()
        };
        debug!("Emitting {:?} to {} handler(s)", event.kind(), listeners.len());
        for listener in listeners {
            listener(&event);
        }
    }
}
