//! The sync manager's only outbound dependency: pulling a range of
//! beacons from one peer. Kept as a trait for the same reason
//! `beacon_engine::Transport` is: the manager must not depend on a
//! concrete wire format (§9, "dynamic dispatch") — `beacon_net`
//! provides the real `SyncChain` implementation, tests provide an
//! in-process one.
use async_trait::async_trait;
use beacon_store::Beacon;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Opens a `SyncChain(from_round)` request against `peer` and streams
/// the response into `tx`, one beacon at a time, in increasing round
/// order. Returns once the peer closes the stream or `cancel` fires;
/// dropping `tx` (the receiver going away) must stop the transfer
/// promptly rather than buffering unboundedly.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn stream_from(
        &self,
        peer: &str,
        from_round: u64,
        tx: mpsc::Sender<Beacon>,
        cancel: &CancellationToken,
    ) -> Result<(), Error>;
}
