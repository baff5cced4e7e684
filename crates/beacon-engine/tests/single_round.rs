//! End-to-end scenario 1 from the beacon's test suite: three nodes,
//! threshold two, one round past genesis should leave every node with
//! an identical, verifiable beacon at round 1.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_crypto::bls::{Partial, Share};
use beacon_crypto::{Poly, SchemeId};
use beacon_engine::{Config, Engine, IncomingPartial, PartialInbox, Transport};
use beacon_group::{Group, GroupDocument, Member};
use beacon_store::{ChainStore, MemoryChainStore};
use parking_lot::RwLock;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;

struct Router {
    inboxes: RwLock<Vec<Arc<PartialInbox>>>,
}

impl Router {
    fn new() -> Self {
        Self {
            inboxes: RwLock::new(Vec::new()),
        }
    }

    fn register(&self, inbox: Arc<PartialInbox>) {
        self.inboxes.write().push(inbox);
    }
}

#[async_trait]
impl Transport for Router {
    async fn broadcast_partial(&self, round: u64, previous_signature: Vec<u8>, partial: Vec<u8>) {
        let parsed = Partial::from_bytes(&partial).expect("engines only ever send well-formed partials");
        for inbox in self.inboxes.read().iter() {
            inbox.push(IncomingPartial {
                round,
                previous_signature: previous_signature.clone(),
                partial: parsed.clone(),
            });
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_nodes_threshold_two_produce_round_one() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let poly = Poly::random(1, &mut rng);
    let commits = poly.commit().commits().iter().map(|c| c.to_compressed().to_vec()).collect();

    let members: Vec<Member> = (1..=3u32)
        .map(|i| Member {
            index: i,
            address: format!("node-{i}:9000"),
            public_key: vec![i as u8; 32],
            signing_key: vec![i as u8 + 10; 32],
        })
        .collect();

    let doc = GroupDocument {
        scheme: SchemeId::ChainedBls12381,
        period_secs: 2,
        genesis_time: beacon_engine::clock::now_unix(),
        transition_time: None,
        threshold: 2,
        members,
        public_key_commits: commits,
        genesis_seed: vec![0xab; 32],
        predecessor_hash: None,
    };
    let group = Arc::new(Group::try_from(doc).unwrap());

    let router = Arc::new(Router::new());
    let mut engines = Vec::new();
    let mut stores: Vec<Arc<dyn ChainStore>> = Vec::new();
    for i in 1..=3u32 {
        let store: Arc<dyn ChainStore> = Arc::new(MemoryChainStore::new(10));
        stores.push(store.clone());
        let share = Share { index: i, scalar: poly.eval(i) };
        let engine = Arc::new(Engine::new(
            group.clone(),
            share,
            store,
            router.clone(),
            Config { timeout_margin: Duration::from_millis(50), partial_queue_capacity: 16 },
        ));
        router.register(engine.inbox());
        engines.push(engine);
    }

    let cancel = CancellationToken::new();
    let handles: Vec<_> = engines
        .iter()
        .map(|e| {
            let e = e.clone();
            let c = cancel.clone();
            tokio::spawn(async move {
                let _ = e.start(c).await;
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    let no_cancel = CancellationToken::new();
    let beacons: Vec<_> = stores.iter().map(|s| s.get(1, &no_cancel).unwrap()).collect();
    let first = &beacons[0];
    assert_eq!(first.round, 1);
    assert_eq!(first.previous_signature, vec![0xab; 32]);
    for beacon in &beacons[1..] {
        assert_eq!(beacon.signature, first.signature);
    }
}
