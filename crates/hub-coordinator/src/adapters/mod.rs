//! Adapters for the coordinator ports.
//!
//! - `memory` - in-memory `MonitoringRepository` / `TargetCatalog`
//! - `channel` - bounded mpsc `PeerSender` feeding a socket writer task
//! - `geolocation` - `Geolocator` implementations (HTTP lookup requires `geolocation`)

pub mod channel;
pub mod geolocation;
pub mod memory;

pub use channel::ChannelPeerSender;
#[cfg(feature = "geolocation")]
pub use geolocation::IpApiGeolocator;
pub use geolocation::NoopGeolocator;
pub use memory::InMemoryRepository;
