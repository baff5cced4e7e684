//! Drives the libp2p swarm on its own task and exposes a cloneable,
//! request/response-shaped handle to the rest of the node — the same
//! "own the swarm on a dedicated task, talk to it over channels" shape
//! as `forest_libp2p::service::Libp2pService`, adapted to this
//! workspace's `tokio::sync` primitives in place of `flume`.
//!
//! Inbound requests this node must answer as a responder (§4.6 step 3,
//! §4.7, §4.5) are routed out to domain-aware consumers through
//! [`Hooks`] rather than handled here, so this module stays ignorant of
//! `beacon_group`/`beacon_dkg` semantics beyond the wire types. A
//! response that needs a blocking read or a round trip through another
//! task (chain history, DKG verification) is answered asynchronously
//! through `pending_replies` rather than stalling the swarm's own poll
//! loop.
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use beacon_crypto::bls::Partial;
use beacon_engine::{IncomingPartial, PartialInbox};
use beacon_store::ChainStore;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use libp2p::multiaddr::Protocol;
use libp2p::request_response::{self, OutboundRequestId, ResponseChannel};
use libp2p::swarm::SwarmEvent;
use libp2p::{Multiaddr, PeerId, Swarm};
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::messages::{BeaconRequest, BeaconResponse, DkgRequest, DkgResponse};
use crate::protocol::{BeaconBehaviour, BeaconBehaviourEvent};

enum Command {
    Beacon {
        addr: Multiaddr,
        request: BeaconRequest,
        reply: oneshot::Sender<Result<BeaconResponse, Error>>,
    },
    Dkg {
        addr: Multiaddr,
        request: DkgRequest,
        reply: oneshot::Sender<Result<DkgResponse, Error>>,
    },
}

/// An inbound DKG packet this node must answer as a responder, handed
/// to whichever `beacon_dkg::Participant` owner is listening on
/// [`Hooks::dkg_tx`]. The listener verifies `request.signature` against
/// the sender's long-term key, applies the packet, and answers through
/// `reply`.
pub struct DkgInbound {
    pub peer: PeerId,
    pub request: DkgRequest,
    pub reply: oneshot::Sender<DkgResponse>,
}

/// Domain hooks wired in by whoever owns the engine, chain store, or
/// DKG ceremony for this node. Each is independently optional so a node
/// that only runs a subset (e.g. a pure relay with no local share)
/// still gets a working responder for the protocols it does serve; the
/// protocols it doesn't are answered with `Rejected`.
#[derive(Clone, Default)]
pub struct Hooks {
    pub inbox: Option<Arc<PartialInbox>>,
    pub store: Option<Arc<dyn ChainStore>>,
    pub dkg_tx: Option<mpsc::UnboundedSender<DkgInbound>>,
}

/// A cheaply-cloneable front for the swarm-driving task. Every method
/// sends a command over the channel and awaits the matching reply;
/// the task itself owns the only `Swarm` and never crosses an await
/// point while holding it borrowed from here.
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::UnboundedSender<Command>,
}

/// Parses a multiaddr of the form `/ip4/.../tcp/.../p2p/<peer id>`,
/// the convention every `Member::address` in this workspace uses so a
/// single string names both a dial target and the peer's identity.
fn split_peer_id(addr: &Multiaddr) -> Result<(Multiaddr, PeerId), Error> {
    let mut addr = addr.clone();
    match addr.pop() {
        Some(Protocol::P2p(peer_id)) => Ok((addr, peer_id)),
        _ => Err(Error::UnknownPeer),
    }
}

pub fn parse_member_address(address: &str) -> Result<Multiaddr, Error> {
    Multiaddr::from_str(address).map_err(|_| Error::UnknownPeer)
}

/// Spawns the event loop on the current tokio runtime and returns a
/// handle to it. The loop exits when every `NodeHandle` clone (and
/// thus the command sender) has been dropped.
pub fn spawn(swarm: Swarm<BeaconBehaviour>, hooks: Hooks) -> NodeHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(swarm, rx, hooks));
    NodeHandle { commands: tx }
}

/// A responder answer that is ready to be sent once its computation (a
/// blocking store read, a DKG verification round trip) completes.
enum PendingReply {
    Beacon(ResponseChannel<BeaconResponse>, BeaconResponse),
    Dkg(ResponseChannel<DkgResponse>, DkgResponse),
}

type PendingFuture = Pin<Box<dyn Future<Output = PendingReply> + Send>>;

async fn run(mut swarm: Swarm<BeaconBehaviour>, mut commands: mpsc::UnboundedReceiver<Command>, hooks: Hooks) {
    let mut pending_beacon: HashMap<OutboundRequestId, oneshot::Sender<Result<BeaconResponse, Error>>> =
        HashMap::new();
    let mut pending_dkg: HashMap<OutboundRequestId, oneshot::Sender<Result<DkgResponse, Error>>> = HashMap::new();
    let mut pending_replies: FuturesUnordered<PendingFuture> = FuturesUnordered::new();

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    None => return,
                    Some(Command::Beacon { addr, request, reply }) => {
                        match split_peer_id(&addr) {
                            Ok((dial_addr, peer_id)) => {
                                swarm.add_peer_address(peer_id, dial_addr);
                                let id = swarm.behaviour_mut().beacon.send_request(&peer_id, request);
                                pending_beacon.insert(id, reply);
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                    Some(Command::Dkg { addr, request, reply }) => {
                        match split_peer_id(&addr) {
                            Ok((dial_addr, peer_id)) => {
                                swarm.add_peer_address(peer_id, dial_addr);
                                let id = swarm.behaviour_mut().dkg.send_request(&peer_id, request);
                                pending_dkg.insert(id, reply);
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                }
            }
            event = swarm.select_next_some() => {
                if let SwarmEvent::Behaviour(event) = event {
                    handle_behaviour_event(event, &mut swarm, &hooks, &mut pending_beacon, &mut pending_dkg, &mut pending_replies);
                }
            }
            Some(reply) = pending_replies.next(), if !pending_replies.is_empty() => {
                match reply {
                    PendingReply::Beacon(channel, response) => {
                        let _ = swarm.behaviour_mut().beacon.send_response(channel, response);
                    }
                    PendingReply::Dkg(channel, response) => {
                        let _ = swarm.behaviour_mut().dkg.send_response(channel, response);
                    }
                }
            }
        }
    }
}

fn handle_behaviour_event(
    event: BeaconBehaviourEvent,
    swarm: &mut Swarm<BeaconBehaviour>,
    hooks: &Hooks,
    pending_beacon: &mut HashMap<OutboundRequestId, oneshot::Sender<Result<BeaconResponse, Error>>>,
    pending_dkg: &mut HashMap<OutboundRequestId, oneshot::Sender<Result<DkgResponse, Error>>>,
    pending_replies: &mut FuturesUnordered<PendingFuture>,
) {
    match event {
        BeaconBehaviourEvent::Beacon(request_response::Event::Message { message, .. }) => match message {
            request_response::Message::Response { request_id, response } => {
                if let Some(reply) = pending_beacon.remove(&request_id) {
                    let _ = reply.send(Ok(response));
                }
            }
            request_response::Message::Request { request, channel, .. } => {
                handle_beacon_request(swarm, hooks, pending_replies, request, channel);
            }
        },
        BeaconBehaviourEvent::Beacon(request_response::Event::OutboundFailure { request_id, error, .. }) => {
            if let Some(reply) = pending_beacon.remove(&request_id) {
                let _ = reply.send(Err(error.into()));
            }
        }
        BeaconBehaviourEvent::Dkg(request_response::Event::Message { peer, message }) => match message {
            request_response::Message::Response { request_id, response } => {
                if let Some(reply) = pending_dkg.remove(&request_id) {
                    let _ = reply.send(Ok(response));
                }
            }
            request_response::Message::Request { request, channel, .. } => {
                handle_dkg_request(swarm, hooks, pending_replies, peer, request, channel);
            }
        },
        BeaconBehaviourEvent::Dkg(request_response::Event::OutboundFailure { request_id, error, .. }) => {
            if let Some(reply) = pending_dkg.remove(&request_id) {
                let _ = reply.send(Err(error.into()));
            }
        }
        _ => {}
    }
}

/// Answers an inbound `BeaconRequest`. `PartialBeacon` is pushed
/// straight into the engine's inbox and acknowledged synchronously;
/// `SyncChain` needs a (possibly blocking) store read, so its answer is
/// deferred onto `pending_replies`.
fn handle_beacon_request(
    swarm: &mut Swarm<BeaconBehaviour>,
    hooks: &Hooks,
    pending_replies: &mut FuturesUnordered<PendingFuture>,
    request: BeaconRequest,
    channel: ResponseChannel<BeaconResponse>,
) {
    match request {
        BeaconRequest::PartialBeacon { round, previous_signature, partial_signature } => {
            let response = match &hooks.inbox {
                Some(inbox) => match Partial::from_bytes(&partial_signature) {
                    Ok(partial) => {
                        inbox.push(IncomingPartial { round, previous_signature, partial });
                        BeaconResponse::Ack
                    }
                    Err(e) => BeaconResponse::Rejected { reason: e.to_string() },
                },
                None => BeaconResponse::Rejected { reason: "this node does not run the beacon engine".into() },
            };
            let _ = swarm.behaviour_mut().beacon.send_response(channel, response);
        }
        BeaconRequest::SyncChain { from_round, max_beacons } => match hooks.store.clone() {
            Some(store) => {
                pending_replies.push(Box::pin(async move {
                    let response = serve_sync_chain(store, from_round, max_beacons).await;
                    PendingReply::Beacon(channel, response)
                }));
            }
            None => {
                let _ = swarm.behaviour_mut().beacon.send_response(
                    channel,
                    BeaconResponse::Rejected { reason: "this node does not serve chain history".into() },
                );
            }
        },
    }
}

/// Forwards an inbound DKG packet to [`Hooks::dkg_tx`] and defers the
/// answer until the ceremony owner has verified and applied it.
fn handle_dkg_request(
    swarm: &mut Swarm<BeaconBehaviour>,
    hooks: &Hooks,
    pending_replies: &mut FuturesUnordered<PendingFuture>,
    peer: PeerId,
    request: DkgRequest,
    channel: ResponseChannel<DkgResponse>,
) {
    let Some(tx) = &hooks.dkg_tx else {
        let _ = swarm.behaviour_mut().dkg.send_response(
            channel,
            DkgResponse::Rejected { reason: "this node is not running a dkg ceremony".into() },
        );
        return;
    };
    let (reply_tx, reply_rx) = oneshot::channel();
    if tx.send(DkgInbound { peer, request, reply: reply_tx }).is_err() {
        let _ = swarm.behaviour_mut().dkg.send_response(
            channel,
            DkgResponse::Rejected { reason: "dkg consumer is no longer running".into() },
        );
        return;
    }
    pending_replies.push(Box::pin(async move {
        let response = reply_rx
            .await
            .unwrap_or(DkgResponse::Rejected { reason: "dkg consumer dropped the reply channel".into() });
        PendingReply::Dkg(channel, response)
    }));
}

/// Walks the store from `from_round` in increasing order, up to
/// `max_beacons` entries, on a blocking thread (§5: store reads must
/// never stall the swarm's poll loop).
async fn serve_sync_chain(store: Arc<dyn ChainStore>, from_round: u64, max_beacons: u32) -> BeaconResponse {
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<beacon_store::Beacon>, beacon_store::Error> {
        let mut cursor = store.cursor()?;
        let mut beacons = Vec::new();
        let mut current = match cursor.seek(from_round) {
            Ok(b) => Some(b),
            Err(beacon_store::Error::NotFound) => None,
            Err(e) => return Err(e),
        };
        while let Some(b) = current {
            beacons.push(b);
            if beacons.len() as u32 >= max_beacons {
                break;
            }
            current = match cursor.next() {
                Ok(b) => Some(b),
                Err(beacon_store::Error::NotFound) => None,
                Err(e) => return Err(e),
            };
        }
        Ok(beacons)
    })
    .await;
    match result {
        Ok(Ok(beacons)) => BeaconResponse::Beacons(beacons),
        Ok(Err(e)) => BeaconResponse::Rejected { reason: e.to_string() },
        Err(e) => BeaconResponse::Rejected { reason: e.to_string() },
    }
}

impl NodeHandle {
    pub async fn send_beacon_request(
        &self,
        addr: &Multiaddr,
        request: BeaconRequest,
    ) -> Result<BeaconResponse, Error> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Beacon { addr: addr.clone(), request, reply })
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    pub async fn send_dkg_request(
        &self,
        addr: &Multiaddr,
        request: DkgRequest,
    ) -> Result<DkgResponse, Error> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Dkg { addr: addr.clone(), request, reply })
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }
}
