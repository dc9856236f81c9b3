//! crates/ad_delivery_core/src/ports.rs
//!
//! Defines the capability contracts (traits) the delivery logic runs against.
//! The network, the host page, visibility observation and identifier storage all
//! sit behind these traits so the delivery lifecycle never touches them directly.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{
    AdRecord, AdResponse, ContainerRef, ElementHandle, LinkActivation, NavigationOptions,
    TransportRequest, VisibilityChange,
};

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// A generic error type for the host-side ports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failures of a single ad request. All variants are transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

//=========================================================================================
// Network Ports
//=========================================================================================

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues exactly one request, failing with `TransportError::Timeout` if no
    /// response arrives within `request.timeout`.
    async fn send(&self, request: &TransportRequest) -> Result<AdResponse, TransportError>;
}

#[async_trait]
pub trait BeaconSender: Send + Sync {
    /// Loads a tracking URL. `Ok` means the beacon was confirmed as loaded.
    async fn fire(&self, url: &str) -> PortResult<()>;
}

//=========================================================================================
// Host Page Ports
//=========================================================================================

/// Turns an ad into markup.
pub trait AdTemplate: Send + Sync {
    fn render(&self, ad: &AdRecord) -> String;
}

#[async_trait]
pub trait HostPage: Send + Sync {
    /// Looks up the element rendered markup should go into.
    fn resolve_container(&self, container: &ContainerRef) -> PortResult<ElementHandle>;

    /// Replaces the container's content with `markup` and returns the rendered root.
    fn install_markup(&self, container: &ElementHandle, markup: &str) -> PortResult<ElementHandle>;

    /// Suppresses default navigation on every link under `root` matching `selector`
    /// and streams their activations instead.
    fn intercept_links(
        &self,
        root: &ElementHandle,
        selector: &str,
    ) -> PortResult<BoxStream<'static, LinkActivation>>;

    /// Opens `url` on the library's behalf.
    async fn navigate(&self, url: &str, options: NavigationOptions) -> PortResult<()>;
}

pub trait VisibilityObserver: Send + Sync {
    /// Starts observing `element`, reporting each time its visible ratio crosses
    /// `threshold`. Dropping the stream disconnects the observer.
    fn observe(
        &self,
        element: &ElementHandle,
        threshold: f64,
    ) -> PortResult<BoxStream<'static, VisibilityChange>>;
}

//=========================================================================================
// Storage Ports
//=========================================================================================

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the identifier stored under `key`, creating and persisting one if absent.
    async fn get_or_create(&self, key: &str) -> PortResult<String>;
}
