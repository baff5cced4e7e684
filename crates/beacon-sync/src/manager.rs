//! The sync manager (§4.7): detects that this node has fallen behind
//! the chain and pulls the missing range from a peer, validating every
//! beacon against the chain invariants and the group's distributed
//! public key before accepting it.
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use beacon_group::Group;
use beacon_store::{Beacon, ChainStore};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::peers::PeerSelector;
use crate::transport::SyncTransport;

#[derive(Clone, Debug)]
pub struct Config {
    /// How long to wait for the next beacon in an open stream before
    /// declaring the attempt stalled.
    pub stall_window: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// How often the periodic tick checks whether this node is synced.
    pub tick_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stall_window: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            tick_period: Duration::from_secs(2),
        }
    }
}

pub struct SyncManager {
    group: Arc<Group>,
    store: Arc<dyn ChainStore>,
    transport: Arc<dyn SyncTransport>,
    config: Config,
    selector: Mutex<PeerSelector>,
    in_progress: Mutex<bool>,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock after epoch").as_secs()
}

impl SyncManager {
    pub fn new(
        group: Arc<Group>,
        my_index: u32,
        store: Arc<dyn ChainStore>,
        transport: Arc<dyn SyncTransport>,
        config: Config,
    ) -> Self {
        let selector = PeerSelector::new(&group, my_index);
        Self {
            group,
            store,
            transport,
            config,
            selector: Mutex::new(selector),
            in_progress: Mutex::new(false),
        }
    }

    /// Records a peer observed ahead of this node, from the engine's
    /// round-ahead hint channel.
    pub fn record_round_ahead(&self, peer_index: u32, round: u64) {
        self.selector.lock().record_hint(peer_index, round);
    }

    fn is_synced(&self, last_round: Option<u64>, current_round: u64) -> bool {
        last_round.unwrap_or(0) + 1 >= current_round
    }

    /// Runs the periodic tick loop: checks whether this node trails
    /// the chain's current logical round and, if so, starts a sync
    /// attempt. Runs until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.tick_period) => {}
            }
            let current_round = self.group.round_at_time(now_unix());
            let last_round = self.last_round(&cancel).await.ok();
            if !self.is_synced(last_round, current_round) {
                if let Err(e) = self.attempt_sync(&cancel).await {
                    tracing::debug!(error = %e, "sync attempt did not complete");
                }
            }
        }
    }

    async fn last_round(&self, cancel: &CancellationToken) -> Result<u64, Error> {
        let store = self.store.clone();
        let token = cancel.clone();
        let result = tokio::task::spawn_blocking(move || store.last(&token))
            .await
            .map_err(|e| Error::PeerUnavailable(e.to_string()))?;
        match result {
            Ok(beacon) => Ok(beacon.round),
            Err(beacon_store::Error::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs a single sync attempt to completion (or failure),
    /// coalescing with any attempt already in flight.
    pub async fn attempt_sync(&self, cancel: &CancellationToken) -> Result<(), Error> {
        {
            let mut guard = self.in_progress.lock();
            if *guard {
                return Ok(());
            }
            *guard = true;
        }
        let result = self.run_attempt(cancel).await;
        *self.in_progress.lock() = false;
        result
    }

    async fn run_attempt(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let mut from_round = self.last_round(cancel).await? + 1;
        let mut expected_previous = if from_round == 1 {
            self.group.genesis_seed.clone()
        } else {
            self.beacon_at(from_round - 1, cancel).await?.signature
        };

        let mut tried: Vec<u32> = Vec::new();
        let mut backoff = self.config.initial_backoff;
        let n = self.group.n().saturating_sub(1).max(1);

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let peer_index = match self.selector.lock().next(&tried) {
                Some(p) => p,
                None => return Err(Error::NoPeers),
            };
            let peer = self
                .group
                .by_index(peer_index)
                .ok_or(Error::NoPeers)?
                .address
                .clone();

            let (tx, mut rx) = mpsc::channel::<Beacon>(16);
            let transport = self.transport.clone();
            let stream_cancel = cancel.clone();
            let stream_peer = peer.clone();
            let stream_task = tokio::spawn(async move {
                transport.stream_from(&stream_peer, from_round, tx, &stream_cancel).await
            });

            let mut made_progress = false;
            let stalled = loop {
                let next = tokio::time::timeout(self.config.stall_window, rx.recv()).await;
                match next {
                    Ok(Some(beacon)) => {
                        if beacon.round != from_round || beacon.previous_signature != expected_previous {
                            break true;
                        }
                        let message = self.group.scheme.message(&beacon.previous_signature, beacon.round);
                        if beacon_crypto::bls::verify(&self.group.public_poly.public_key(), &message, &beacon.signature).is_err() {
                            break true;
                        }
                        self.store_beacon(beacon.clone(), cancel).await?;
                        expected_previous = beacon.signature;
                        from_round += 1;
                        made_progress = true;
                    }
                    Ok(None) => {
                        drop(rx);
                        let _ = stream_task.await;
                        return Ok(());
                    }
                    Err(_) => break true,
                }
            };
            drop(rx);
            let _ = stream_task.await;

            if stalled {
                tried.push(peer_index);
            }
            if tried.len() as u32 >= n {
                tried.clear();
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(self.config.max_backoff);
            } else if made_progress {
                backoff = self.config.initial_backoff;
            }
        }
    }

    async fn beacon_at(&self, round: u64, cancel: &CancellationToken) -> Result<Beacon, Error> {
        let store = self.store.clone();
        let token = cancel.clone();
        Ok(tokio::task::spawn_blocking(move || store.get(round, &token))
            .await
            .map_err(|e| Error::PeerUnavailable(e.to_string()))??)
    }

    async fn store_beacon(&self, beacon: Beacon, cancel: &CancellationToken) -> Result<(), Error> {
        let store = self.store.clone();
        let token = cancel.clone();
        tokio::task::spawn_blocking(move || store.put(beacon, &token))
            .await
            .map_err(|e| Error::PeerUnavailable(e.to_string()))??;
        Ok(())
    }
}
