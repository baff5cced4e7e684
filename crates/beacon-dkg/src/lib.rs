//! Distributed key generation and resharing (§4.5): dealer polynomial
//! generation, peer-key-encrypted share delivery, complaint and
//! justification handling, and qualified-set derivation of the new
//! group's share and public polynomial. Network delivery of the
//! packets this module produces is `beacon_net`'s job; this crate only
//! holds the ceremony's state and algebra.

pub mod crypto_box;
pub mod deal;
pub mod error;
pub mod participant;
pub mod state;

pub use crypto_box::SealedShare;
pub use deal::{Deal, Justification, Response};
pub use error::Error;
pub use participant::{Config, Mode, Participant};
pub use state::Phase;
