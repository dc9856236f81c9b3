//! services/ad_client/src/error.rs
//!
//! Defines the error types for ad delivery and for the command-line tool.

use crate::config::ConfigError;
use ad_delivery_core::ports::{PortError, TransportError};

/// Errors surfaced by the delivery engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The session cannot make requests at all. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The last transient failure after the retry budget was spent.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The host page could not take the rendered ad.
    #[error("Render error: {0}")]
    Render(#[from] PortError),
}

impl DeliveryError {
    /// Whether the retry policy applies to this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transport(_))
    }
}

/// The primary error type for the `adctl` binary.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the delivery engine.
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Represents a standard Input/Output error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
