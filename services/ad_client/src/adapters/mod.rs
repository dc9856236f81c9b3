pub mod headless_page;
pub mod http_beacon;
pub mod http_transport;
pub mod identity;

pub use headless_page::HeadlessPage;
pub use http_beacon::HttpBeaconSender;
pub use http_transport::HttpTransport;
pub use identity::{FileIdentityStore, MemoryIdentityStore};
