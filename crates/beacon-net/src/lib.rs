//! Authenticated, length-prefixed RPC transport (§4.3). Node-to-node
//! traffic rides `libp2p` request-response behaviours over a
//! noise-authenticated, yamux-multiplexed TCP transport
//! (`transport`/`protocol`); the client-facing public API is a small
//! `axum` HTTP service (`client_api`), since it authenticates clients
//! differently (or not at all) and was never part of the node-to-node
//! trust boundary.

pub mod adapter;
pub mod client_api;
pub mod codec;
pub mod error;
pub mod handle;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use adapter::{DkgService, EngineTransport, SyncClientTransport};
pub use client_api::{router, RpcState};
pub use error::Error;
pub use handle::{parse_member_address, spawn, DkgInbound, Hooks, NodeHandle};
pub use messages::{
    BeaconRequest, BeaconResponse, BeaconView, ChainInfoView, DkgPacketKind, DkgRequest, DkgResponse,
};
pub use protocol::{BeaconBehaviour, BeaconBehaviourEvent, BEACON_PROTOCOL, DKG_PROTOCOL};
pub use transport::build_swarm;
