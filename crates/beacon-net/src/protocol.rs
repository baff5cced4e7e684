use std::time::Duration;

use libp2p::request_response::{self, ProtocolSupport};
use libp2p::swarm::NetworkBehaviour;
use libp2p::StreamProtocol;

use crate::codec::LengthPrefixedCbor;
use crate::messages::{BeaconRequest, BeaconResponse, DkgRequest, DkgResponse};

/// Node-to-node partial-signature and catch-up traffic (§6 family 1).
pub const BEACON_PROTOCOL: StreamProtocol = StreamProtocol::new("/beacon/sign/1.0.0");
/// DKG packet delivery during a ceremony (§6 family 3).
pub const DKG_PROTOCOL: StreamProtocol = StreamProtocol::new("/beacon/dkg/1.0.0");

pub type BeaconCodec = LengthPrefixedCbor<BeaconRequest, BeaconResponse>;
pub type DkgCodec = LengthPrefixedCbor<DkgRequest, DkgResponse>;

fn request_response_config() -> request_response::Config {
    request_response::Config::default().with_request_timeout(Duration::from_secs(20))
}

/// The libp2p behaviour combining both protocol families this workspace
/// drives over the authenticated transport. A third, client-facing
/// surface (§6 family 2) is served separately over HTTP — see
/// `client_api` — since it has no peer identity to authenticate beyond
/// ordinary TLS termination, which is out of scope (§1, excluded
/// collaborators).
#[derive(NetworkBehaviour)]
pub struct BeaconBehaviour {
    pub beacon: request_response::Behaviour<BeaconCodec>,
    pub dkg: request_response::Behaviour<DkgCodec>,
}

impl BeaconBehaviour {
    pub fn new() -> Self {
        let beacon = request_response::Behaviour::with_codec(
            LengthPrefixedCbor::new(),
            [(BEACON_PROTOCOL, ProtocolSupport::Full)],
            request_response_config(),
        );
        let dkg = request_response::Behaviour::with_codec(
            LengthPrefixedCbor::new(),
            [(DKG_PROTOCOL, ProtocolSupport::Full)],
            request_response_config(),
        );
        Self { beacon, dkg }
    }
}

impl Default for BeaconBehaviour {
    fn default() -> Self {
        Self::new()
    }
}
