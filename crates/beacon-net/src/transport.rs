use libp2p::{identity, noise, tcp, yamux, Swarm, SwarmBuilder};

use crate::protocol::BeaconBehaviour;

/// Builds the node-to-node swarm: TCP transport, Noise for mutual
/// authentication keyed off the node's long-term identity, Yamux for
/// stream multiplexing. Every peer is authenticated by its libp2p
/// identity before either the beacon or DKG protocol will exchange a
/// single message.
pub fn build_swarm(keypair: identity::Keypair) -> Result<Swarm<BeaconBehaviour>, anyhow::Error> {
    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)?
        .with_behaviour(|_| BeaconBehaviour::new())?
        .build();
    Ok(swarm)
}
