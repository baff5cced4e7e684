use serde::{Deserialize, Serialize};

use beacon_store::Beacon;

/// Node-to-node beacon traffic: partial signature gossip and chain
/// catch-up. Matches §6's wire contract; `SyncChain` is modeled as a
/// bounded batch request rather than a true stream because
/// `libp2p::request_response` is request/reply — `beacon_sync` issues
/// repeated `SyncChain` calls to walk an unbounded range.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BeaconRequest {
    PartialBeacon {
        round: u64,
        previous_signature: Vec<u8>,
        partial_signature: Vec<u8>,
    },
    SyncChain {
        from_round: u64,
        /// Caps a single response's batch size; the ceiling itself
        /// (independent of this request-side hint) is enforced by the
        /// codec's frame-size limit.
        max_beacons: u32,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BeaconResponse {
    Ack,
    Rejected { reason: String },
    Beacons(Vec<Beacon>),
}

/// DKG packet kinds exchanged during a ceremony. Each packet is signed
/// by the sender's long-term key; `adapter::DkgService` verifies the
/// signature against the sender's `Member::signing_key` before handing
/// `payload` to `beacon_dkg::Participant`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DkgPacketKind {
    Deal,
    Response,
    Justification,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DkgRequest {
    pub kind: DkgPacketKind,
    pub sender_index: u32,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DkgResponse {
    Ack,
    Rejected { reason: String },
}

/// Client-facing responses for the HTTP surface (§6 Public API).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeaconView {
    pub round: u64,
    pub previous_signature: String,
    pub signature: String,
    pub randomness: String,
}

impl From<&Beacon> for BeaconView {
    fn from(b: &Beacon) -> Self {
        Self {
            round: b.round,
            previous_signature: hex::encode(&b.previous_signature),
            signature: hex::encode(&b.signature),
            randomness: hex::encode(b.randomness()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainInfoView {
    pub public_key: String,
    pub period: u64,
    pub genesis_time: u64,
    pub hash: String,
    pub group_hash: String,
    pub scheme_id: String,
}
