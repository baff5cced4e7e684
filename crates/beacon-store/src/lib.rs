//! Ordered, append-oriented persistence of beacons keyed by round.
//! Two implementations share one [`ChainStore`] contract: [`memory::MemoryChainStore`],
//! a bounded in-memory ring for hot-path reads, and the `sled`-backed
//! [`sled_store::SledChainStore`] for durable storage — the same
//! "always have a `MemoryDB`, feature-gate the disk backend" split as
//! `node/db`.

pub mod codec;
pub mod error;
pub mod memory;

#[cfg(feature = "sled")]
pub mod sled_store;

pub use codec::Beacon;
pub use error::Error;
pub use memory::MemoryChainStore;
#[cfg(feature = "sled")]
pub use sled_store::SledChainStore;

use tokio_util::sync::CancellationToken;

/// Short-lived, forward-only traversal of the store in increasing
/// round order. A `Cursor` does not need to observe writes made after
/// it was created.
pub trait Cursor {
    fn first(&mut self) -> Result<Beacon, Error>;
    fn last(&mut self) -> Result<Beacon, Error>;
    fn next(&mut self) -> Result<Beacon, Error>;
    fn seek(&mut self, round: u64) -> Result<Beacon, Error>;
}

/// The chain store contract both implementations satisfy. Every
/// operation that might touch the backend takes a cancellation token;
/// a token cancelled before the call begins must short-circuit to
/// `Err(Error::Cancelled)` without touching storage.
pub trait ChainStore: Send + Sync {
    /// Upserts a beacon. Engine traffic is expected to call this once
    /// per round; callers that insert a duplicate round must observe
    /// the store unchanged (idempotent), not an error.
    fn put(&self, beacon: Beacon, cancel: &CancellationToken) -> Result<(), Error>;

    fn get(&self, round: u64, cancel: &CancellationToken) -> Result<Beacon, Error>;

    /// The highest-round beacon stored, or `NotFound` if the store is
    /// empty.
    fn last(&self, cancel: &CancellationToken) -> Result<Beacon, Error>;

    fn len(&self) -> Result<u64, Error>;

    /// Administrative deletion; idempotent, never called by the engine
    /// during normal operation.
    fn delete(&self, round: u64) -> Result<(), Error>;

    fn cursor(&self) -> Result<Box<dyn Cursor + '_>, Error>;

    fn save_to(&self, writer: &mut dyn std::io::Write) -> Result<(), Error>;

    fn close(&self) -> Result<(), Error>;
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), Error> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

pub(crate) use check_cancelled as guard;
