//! Drives two real `Swarm`s over loopback TCP and exercises the
//! responder path: an inbound `PartialBeacon` must reach the engine's
//! inbox, and an inbound `SyncChain` must be answered from the chain
//! store, not silently dropped.
use std::sync::Arc;
use std::time::Duration;

use beacon_crypto::bls::{sign_partial, Share};
use beacon_crypto::Poly;
use beacon_engine::PartialInbox;
use beacon_net::{build_swarm, spawn, BeaconBehaviour, BeaconRequest, BeaconResponse, Hooks};
use beacon_store::{Beacon, ChainStore, MemoryChainStore};
use futures::StreamExt;
use libp2p::multiaddr::Protocol;
use libp2p::swarm::SwarmEvent;
use libp2p::{identity, Multiaddr, Swarm};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;

async fn listen(swarm: &mut Swarm<BeaconBehaviour>) -> Multiaddr {
    swarm.listen_on("/ip4/127.0.0.1/tcp/0".parse().unwrap()).unwrap();
    loop {
        if let SwarmEvent::NewListenAddr { address, .. } = swarm.select_next_some().await {
            let peer_id = *swarm.local_peer_id();
            return address.with(Protocol::P2p(peer_id));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_beacon_request_reaches_the_inbox() {
    let mut server_swarm = build_swarm(identity::Keypair::generate_ed25519()).unwrap();
    let server_addr = listen(&mut server_swarm).await;

    let inbox = Arc::new(PartialInbox::new(8));
    let hooks = Hooks { inbox: Some(inbox.clone()), store: None, dkg_tx: None };
    spawn(server_swarm, hooks);

    let client_swarm = build_swarm(identity::Keypair::generate_ed25519()).unwrap();
    let client = spawn(client_swarm, Hooks::default());

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let poly = Poly::random(1, &mut rng);
    let share = Share { index: 1, scalar: poly.eval(1) };
    let partial = sign_partial(&share, &[7u8; 32]);

    let response = client
        .send_beacon_request(
            &server_addr,
            BeaconRequest::PartialBeacon {
                round: 7,
                previous_signature: vec![0xab; 32],
                partial_signature: partial.to_bytes(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(response, BeaconResponse::Ack));

    let received = tokio::time::timeout(Duration::from_secs(5), inbox.recv()).await.unwrap();
    assert_eq!(received.round, 7);
    assert_eq!(received.previous_signature, vec![0xab; 32]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_chain_request_is_served_from_the_store() {
    let store: Arc<dyn ChainStore> = Arc::new(MemoryChainStore::new(10));
    let cancel = CancellationToken::new();
    for round in 1..=3u64 {
        store
            .put(
                Beacon {
                    round,
                    previous_signature: vec![0u8; 4],
                    signature: vec![round as u8; 4],
                },
                &cancel,
            )
            .unwrap();
    }

    let mut server_swarm = build_swarm(identity::Keypair::generate_ed25519()).unwrap();
    let server_addr = listen(&mut server_swarm).await;
    let hooks = Hooks { inbox: None, store: Some(store), dkg_tx: None };
    spawn(server_swarm, hooks);

    let client_swarm = build_swarm(identity::Keypair::generate_ed25519()).unwrap();
    let client = spawn(client_swarm, Hooks::default());

    let response = client
        .send_beacon_request(&server_addr, BeaconRequest::SyncChain { from_round: 1, max_beacons: 10 })
        .await
        .unwrap();
    match response {
        BeaconResponse::Beacons(beacons) => {
            assert_eq!(beacons.len(), 3);
            assert_eq!(beacons[0].round, 1);
            assert_eq!(beacons[2].round, 3);
        }
        other => panic!("expected Beacons, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn requests_without_a_matching_hook_are_rejected_not_dropped() {
    let mut server_swarm = build_swarm(identity::Keypair::generate_ed25519()).unwrap();
    let server_addr = listen(&mut server_swarm).await;
    spawn(server_swarm, Hooks::default());

    let client_swarm = build_swarm(identity::Keypair::generate_ed25519()).unwrap();
    let client = spawn(client_swarm, Hooks::default());

    let response = client
        .send_beacon_request(&server_addr, BeaconRequest::SyncChain { from_round: 0, max_beacons: 10 })
        .await
        .unwrap();
    assert!(matches!(response, BeaconResponse::Rejected { .. }));
}
