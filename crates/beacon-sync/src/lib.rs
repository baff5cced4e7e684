//! Gap detection and catch-up synchronization (§4.7): notices that this
//! node trails the chain and pulls the missing range from a peer,
//! validating each beacon against the chain invariants and the
//! group's distributed public key before accepting it.

pub mod error;
pub mod manager;
pub mod peers;
pub mod transport;

pub use error::Error;
pub use manager::{Config, SyncManager};
pub use peers::PeerSelector;
pub use transport::SyncTransport;
