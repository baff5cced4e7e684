//! Mirrors `node/db/benches/rocksdb_sim_bench.rs`: a small criterion
//! benchmark over the durable backend's write path.
use beacon_store::{Beacon, ChainStore, SledChainStore};
use criterion::{criterion_group, criterion_main, Criterion};
use tokio_util::sync::CancellationToken;

fn beacon(round: u64) -> Beacon {
    Beacon {
        round,
        previous_signature: vec![0u8; 96],
        signature: vec![round as u8; 96],
    }
}

fn put_sequential(c: &mut Criterion) {
    let store = SledChainStore::temporary().expect("open temporary store");
    let token = CancellationToken::new();
    let mut round = 0u64;
    c.bench_function("sled_put_sequential", |b| {
        b.iter(|| {
            round += 1;
            store.put(beacon(round), &token).unwrap();
        })
    });
}

criterion_group!(benches, put_sequential);
criterion_main!(benches);
