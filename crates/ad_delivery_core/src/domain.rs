//! crates/ad_delivery_core/src/domain.rs
//!
//! Defines the pure, core data structures for ad delivery.
//! These types carry the wire shapes of the serving backend and the handles the
//! host page hands back, but hold no behavior of their own.

use serde::{Deserialize, Serialize};
use std::time::Duration;

//=========================================================================================
// Ads and Requests
//=========================================================================================

/// A single advertisement as returned by the serving backend.
///
/// The record is immutable once received. Fields the delivery logic does not
/// understand are kept in `extra` so templates can still reach them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRecord {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub advertiser: String,
    /// Tracking redirect. Navigation goes through this URL when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_url: Option<String>,
    /// Impression beacon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_url: Option<String>,
    /// Dwell beacon, fired once the ad has been visible long enough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewability_url: Option<String>,
    /// Untracked final destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Selects the payload shape and endpoint of an ad request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    #[default]
    UserQuery,
    AgentResponse,
}

impl RequestMode {
    /// The endpoint path, relative to the API base, for this mode.
    pub fn endpoint_path(self) -> &'static str {
        match self {
            RequestMode::UserQuery => "/ads/user-query",
            RequestMode::AgentResponse => "/ads/agent-response",
        }
    }
}

/// The text an ad is matched against.
///
/// Either a bare string, or a structured input where `query` feeds user-query
/// requests and `response` feeds agent-response requests.
#[derive(Debug, Clone, PartialEq)]
pub enum AdInput {
    Text(String),
    Structured {
        query: Option<String>,
        response: Option<String>,
    },
}

impl AdInput {
    /// Picks the text relevant to `mode`, if the input carries one.
    pub fn text_for(&self, mode: RequestMode) -> Option<&str> {
        match (self, mode) {
            (AdInput::Text(text), _) => Some(text.as_str()),
            (AdInput::Structured { query, .. }, RequestMode::UserQuery) => query.as_deref(),
            (AdInput::Structured { response, .. }, RequestMode::AgentResponse) => {
                response.as_deref()
            }
        }
    }
}

impl From<&str> for AdInput {
    fn from(text: &str) -> Self {
        AdInput::Text(text.to_string())
    }
}

impl From<String> for AdInput {
    fn from(text: String) -> Self {
        AdInput::Text(text)
    }
}

/// The JSON body posted to the serving backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<String>,
    pub user_id: String,
    pub platform: String,
    pub location: String,
}

/// The success body of the serving backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdResponse {
    #[serde(default)]
    pub ads: Option<Vec<AdRecord>>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Everything a transport needs to issue one request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub endpoint: String,
    pub api_key: String,
    pub payload: AdRequestPayload,
    pub timeout: Duration,
}

//=========================================================================================
// Host Page Handles
//=========================================================================================

/// An opaque reference to an element owned by the host page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where rendered markup should be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRef {
    /// A selector the host page resolves.
    Selector(String),
    /// An element the caller already holds.
    Element(ElementHandle),
}

/// A tracked link activation, delivered with the page's default navigation already suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkActivation {
    pub element: ElementHandle,
    pub href: String,
}

/// One visibility observation for an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityChange {
    /// Fraction of the element's area intersecting the viewport, in `0.0..=1.0`.
    pub ratio: f64,
    /// When the observation was taken, relative to a fixed time origin.
    pub time: Duration,
}

/// How the host page should open a navigation the library performs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationOptions {
    pub new_context: bool,
    pub no_referrer: bool,
    pub no_opener: bool,
}

impl NavigationOptions {
    /// A new browsing context that receives neither a referrer nor an opener.
    pub fn isolated() -> Self {
        Self {
            new_context: true,
            no_referrer: true,
            no_opener: true,
        }
    }
}
