//! The per-round beacon state machine (§4.6): `Init → Sign → Collect →
//! Recover | Timeout`, clocked off the group's genesis and period,
//! producing and persisting one chained BLS signature per round.

pub mod clock;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod inbox;
pub mod transport;

pub use collector::Collector;
pub use config::Config;
pub use engine::Engine;
pub use error::Error;
pub use inbox::{IncomingPartial, PartialInbox};
pub use transport::Transport;
