//! Wires [`NodeHandle`] into the small `Transport` traits `beacon_engine`
//! and `beacon_sync` depend on (§9 "dynamic dispatch"), so neither crate
//! needs to know `libp2p` exists.
use std::sync::Arc;

use beacon_dkg::{Deal, Justification, Participant, Response};
use beacon_group::Group;
use libp2p::identity::ed25519;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::handle::{parse_member_address, DkgInbound, NodeHandle};
use crate::messages::{BeaconRequest, DkgPacketKind, DkgRequest, DkgResponse};

/// Broadcasts a node's partial signature to every other committee
/// member over the beacon protocol. Failures are logged, not
/// propagated: `beacon_engine::Transport::broadcast_partial` returns
/// nothing because the round still succeeds once `t` of `n` members
/// receive it, and a single unreachable peer is not fatal.
pub struct EngineTransport {
    handle: NodeHandle,
    group: Arc<Group>,
    my_index: u32,
}

impl EngineTransport {
    pub fn new(handle: NodeHandle, group: Arc<Group>, my_index: u32) -> Self {
        Self { handle, group, my_index }
    }
}

#[async_trait::async_trait]
impl beacon_engine::Transport for EngineTransport {
    async fn broadcast_partial(&self, round: u64, previous_signature: Vec<u8>, partial: Vec<u8>) {
        let peers: Vec<_> = self
            .group
            .members
            .iter()
            .filter(|m| m.index != self.my_index)
            .cloned()
            .collect();
        for peer in peers {
            let addr = match parse_member_address(&peer.address) {
                Ok(addr) => addr,
                Err(e) => {
                    tracing::warn!(peer = peer.index, error = %e, "skipping unparseable peer address");
                    continue;
                }
            };
            let handle = self.handle.clone();
            let request = BeaconRequest::PartialBeacon {
                round,
                previous_signature: previous_signature.clone(),
                partial_signature: partial.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = handle.send_beacon_request(&addr, request).await {
                    tracing::warn!(peer = peer.index, error = %e, "partial broadcast to peer failed");
                }
            });
        }
    }
}

/// Pulls a catch-up range from one peer by repeatedly issuing bounded
/// `SyncChain` requests (libp2p `request_response` is request/reply,
/// not a true stream — see `messages::BeaconRequest::SyncChain`) and
/// forwarding each returned beacon in order.
pub struct SyncClientTransport {
    handle: NodeHandle,
    batch_size: u32,
}

impl SyncClientTransport {
    pub fn new(handle: NodeHandle) -> Self {
        Self { handle, batch_size: 64 }
    }
}

#[async_trait::async_trait]
impl beacon_sync::SyncTransport for SyncClientTransport {
    async fn stream_from(
        &self,
        peer: &str,
        from_round: u64,
        tx: mpsc::Sender<beacon_store::Beacon>,
        cancel: &CancellationToken,
    ) -> Result<(), beacon_sync::Error> {
        let addr = parse_member_address(peer).map_err(|e| beacon_sync::Error::PeerUnavailable(e.to_string()))?;
        let mut next_round = from_round;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let request = BeaconRequest::SyncChain { from_round: next_round, max_beacons: self.batch_size };
            let response = self
                .handle
                .send_beacon_request(&addr, request)
                .await
                .map_err(|e| beacon_sync::Error::PeerUnavailable(e.to_string()))?;
            let beacons = match response {
                crate::messages::BeaconResponse::Beacons(beacons) => beacons,
                crate::messages::BeaconResponse::Rejected { reason } => {
                    return Err(beacon_sync::Error::PeerUnavailable(reason));
                }
                crate::messages::BeaconResponse::Ack => Vec::new(),
            };
            if beacons.is_empty() {
                return Ok(());
            }
            let got = beacons.len() as u64;
            for beacon in beacons {
                next_round = next_round.max(beacon.round + 1);
                if tx.send(beacon).await.is_err() {
                    return Ok(());
                }
            }
            if got < self.batch_size as u64 {
                return Ok(());
            }
        }
    }
}

/// A response packet's wire form. `beacon_dkg::Response` only carries a
/// verdict; the dealer it concerns is implied by context inside
/// `Participant`, so the broadcast packet bundles it explicitly.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct ResponsePacket {
    dealer_index: u32,
    response: Response,
}

/// Drives one node's DKG or resharing ceremony over the network:
/// signs and broadcasts this node's own packets, and verifies,
/// applies, and (where the ceremony calls for it) relays packets
/// received from other members. Owns the only live `Participant` for
/// this ceremony, the same "one task owns the mutable state, everyone
/// else talks to it" shape `EngineTransport` and `NodeHandle` use for
/// the swarm itself.
pub struct DkgService {
    participant: Mutex<Participant>,
    group: Arc<Group>,
    my_index: u32,
    signing_key: ed25519::Keypair,
    handle: NodeHandle,
}

impl DkgService {
    /// Builds the service and spawns its inbound-packet task, handing
    /// back the sender half to be wired into [`crate::handle::Hooks::dkg_tx`].
    pub fn new(
        participant: Participant,
        group: Arc<Group>,
        my_index: u32,
        signing_key: ed25519::Keypair,
        handle: NodeHandle,
    ) -> (Arc<Self>, mpsc::UnboundedSender<DkgInbound>) {
        let service = Arc::new(Self {
            participant: Mutex::new(participant),
            group,
            my_index,
            signing_key,
            handle,
        });
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(service.clone().run(rx));
        (service, tx)
    }

    async fn run(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<DkgInbound>) {
        while let Some(packet) = inbound.recv().await {
            let response = self.handle_inbound(packet.request).await;
            let _ = packet.reply.send(response);
        }
    }

    /// Verifies the sender's signature, applies the packet to the
    /// local ceremony state, and kicks off this node's own follow-on
    /// broadcast (a response to a deal, a justification to a
    /// complaint) where the ceremony calls for one. The follow-on send
    /// runs on its own task so a slow peer can never stall the inbound
    /// handler.
    async fn handle_inbound(self: &Arc<Self>, request: DkgRequest) -> DkgResponse {
        let Some(sender) = self.group.by_index(request.sender_index) else {
            return DkgResponse::Rejected { reason: "unknown sender index".into() };
        };
        let public_key = match ed25519::PublicKey::try_from_bytes(&sender.signing_key) {
            Ok(k) => k,
            Err(_) => return DkgResponse::Rejected { reason: "sender signing key is malformed".into() },
        };
        if !public_key.verify(&request.payload, &request.signature) {
            return DkgResponse::Rejected { reason: "signature verification failed".into() };
        }

        match request.kind {
            DkgPacketKind::Deal => {
                let deal: Deal = match cbor4ii::serde::from_slice(&request.payload) {
                    Ok(d) => d,
                    Err(e) => return DkgResponse::Rejected { reason: e.to_string() },
                };
                let dealer_index = deal.dealer_index;
                let verdict = self.participant.lock().await.receive_deal(deal);
                match verdict {
                    Ok(response) => {
                        let service = self.clone();
                        tokio::spawn(async move { service.broadcast_response(dealer_index, response).await });
                        DkgResponse::Ack
                    }
                    Err(e) => DkgResponse::Rejected { reason: e.to_string() },
                }
            }
            DkgPacketKind::Response => {
                let packet: ResponsePacket = match cbor4ii::serde::from_slice(&request.payload) {
                    Ok(p) => p,
                    Err(e) => return DkgResponse::Rejected { reason: e.to_string() },
                };
                let accuses_me = packet.dealer_index == self.my_index && matches!(packet.response, Response::Complaint { .. });
                self.participant
                    .lock()
                    .await
                    .record_response(packet.dealer_index, request.sender_index, packet.response);
                if accuses_me {
                    let service = self.clone();
                    let responder_index = request.sender_index;
                    tokio::spawn(async move { service.justify_and_broadcast(responder_index).await });
                }
                DkgResponse::Ack
            }
            DkgPacketKind::Justification => {
                let justification: Justification = match cbor4ii::serde::from_slice(&request.payload) {
                    Ok(j) => j,
                    Err(e) => return DkgResponse::Rejected { reason: e.to_string() },
                };
                match self.participant.lock().await.receive_justification(justification) {
                    Ok(()) => DkgResponse::Ack,
                    Err(e) => DkgResponse::Rejected { reason: e.to_string() },
                }
            }
        }
    }

    /// Deals this node's own contribution and broadcasts it to every
    /// other member.
    pub async fn deal_and_broadcast(self: &Arc<Self>, rng: &mut impl rand::RngCore) -> Result<(), beacon_dkg::Error> {
        let deal = self.participant.lock().await.deal(rng)?;
        self.broadcast(DkgPacketKind::Deal, &deal).await;
        Ok(())
    }

    async fn broadcast_response(self: Arc<Self>, dealer_index: u32, response: Response) {
        self.broadcast(DkgPacketKind::Response, &ResponsePacket { dealer_index, response }).await;
    }

    async fn justify_and_broadcast(self: Arc<Self>, responder_index: u32) {
        let justification = self.participant.lock().await.justify(responder_index);
        if let Ok(justification) = justification {
            self.broadcast(DkgPacketKind::Justification, &justification).await;
        }
    }

    async fn broadcast<T: serde::Serialize>(&self, kind: DkgPacketKind, payload: &T) {
        let Ok(bytes) = cbor4ii::serde::to_vec(Vec::new(), payload) else {
            tracing::warn!("failed to encode outbound dkg packet, dropping broadcast");
            return;
        };
        let signature = self.signing_key.sign(&bytes);
        let request = DkgRequest { kind, sender_index: self.my_index, payload: bytes, signature };
        for member in &self.group.members {
            if member.index == self.my_index {
                continue;
            }
            let Ok(addr) = parse_member_address(&member.address) else {
                tracing::warn!(peer = member.index, "skipping unparseable peer address");
                continue;
            };
            let peer_index = member.index;
            let handle = self.handle.clone();
            let request = request.clone();
            tokio::spawn(async move {
                if let Err(e) = handle.send_dkg_request(&addr, request).await {
                    tracing::warn!(peer = peer_index, error = %e, "dkg broadcast to peer failed");
                }
            });
        }
    }

    /// Finalizes the local ceremony once the response (and, if needed,
    /// justification) window has closed.
    pub async fn finalize(&self) -> Result<(beacon_crypto::Share, beacon_crypto::PublicPoly), beacon_dkg::Error> {
        self.participant.lock().await.finalize()
    }

    /// Aborts a ceremony stalled past its response timeout. See
    /// `beacon_dkg::Participant::check_timeout`.
    pub async fn check_timeout(&self) -> bool {
        self.participant.lock().await.check_timeout()
    }
}
