//! The engine's only outbound dependency: broadcasting this node's
//! partial to the rest of the committee. Kept as a trait so the engine
//! never depends on a concrete wire format or transport crate (§9,
//! "dynamic dispatch") — `beacon_net` provides the real implementation,
//! tests provide an in-process one.
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn broadcast_partial(&self, round: u64, previous_signature: Vec<u8>, partial: Vec<u8>);
}
