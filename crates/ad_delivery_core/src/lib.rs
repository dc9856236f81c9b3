pub mod domain;
pub mod ports;

pub use domain::{
    AdInput, AdRecord, AdRequestPayload, AdResponse, ContainerRef, ElementHandle, LinkActivation,
    NavigationOptions, RequestMode, TransportRequest, VisibilityChange,
};
pub use ports::{
    AdTemplate, BeaconSender, HostPage, IdentityStore, PortError, PortResult, Transport,
    TransportError, VisibilityObserver,
};
