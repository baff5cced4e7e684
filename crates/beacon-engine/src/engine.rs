//! The round driver (§4.6): `Init → Sign → Collect → Recover |
//! Timeout`, run in a loop from a starting round until cancelled.
use std::sync::Arc;

use beacon_crypto::bls::{sign_partial, Share};
use beacon_group::Group;
use beacon_store::{Beacon, ChainStore};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::clock;
use crate::collector::Collector;
use crate::config::Config;
use crate::error::Error;
use crate::inbox::{IncomingPartial, PartialInbox};
use crate::transport::Transport;

enum RoundOutcome {
    Produced(Beacon),
    Missed,
}

type Callback = Arc<dyn Fn(&Beacon) + Send + Sync>;

/// Drives one group's chain forward one round at a time. Holds the
/// share exclusively (§5, "Shared resources": "never serialized over
/// the transport") and the only handle to the store's write path for
/// this chain.
pub struct Engine {
    group: Arc<Group>,
    share: Share,
    store: Arc<dyn ChainStore>,
    transport: Arc<dyn Transport>,
    config: Config,
    callbacks: Mutex<Vec<Callback>>,
    inbox: Arc<PartialInbox>,
    round_ahead_tx: Option<mpsc::UnboundedSender<(u32, u64)>>,
    sync_request_tx: Option<mpsc::UnboundedSender<u64>>,
    sync_ready: Arc<Notify>,
}

impl Engine {
    pub fn new(
        group: Arc<Group>,
        share: Share,
        store: Arc<dyn ChainStore>,
        transport: Arc<dyn Transport>,
        config: Config,
    ) -> Self {
        let inbox = Arc::new(PartialInbox::new(config.partial_queue_capacity));
        Self {
            group,
            share,
            store,
            transport,
            config,
            callbacks: Mutex::new(Vec::new()),
            inbox,
            round_ahead_tx: None,
            sync_request_tx: None,
            sync_ready: Arc::new(Notify::new()),
        }
    }

    /// Wires a sync manager: `round_ahead_tx` receives `(peer_index,
    /// round)` hints from partials observed ahead of this node's
    /// current round; `sync_request_tx` receives "please catch up to
    /// at least this round" requests, and the caller should call
    /// [`Engine::notify_synced`] once it has.
    pub fn with_sync_manager(mut self, round_ahead_tx: mpsc::UnboundedSender<(u32, u64)>, sync_request_tx: mpsc::UnboundedSender<u64>) -> Self {
        self.round_ahead_tx = Some(round_ahead_tx);
        self.sync_request_tx = Some(sync_request_tx);
        self
    }

    pub fn register_callback(&self, f: impl Fn(&Beacon) + Send + Sync + 'static) {
        self.callbacks.lock().push(Arc::new(f));
    }

    /// A handle the transport layer pushes incoming wire partials into.
    pub fn inbox(&self) -> Arc<PartialInbox> {
        self.inbox.clone()
    }

    /// Wakes an engine suspended in `Timeout` waiting on the sync
    /// manager to catch the chain up past a missing round.
    pub fn notify_synced(&self) {
        self.sync_ready.notify_waiters();
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    /// Starts production at round 1, waiting for genesis if it has not
    /// yet arrived.
    pub async fn start(self: Arc<Self>, cancel: CancellationToken) -> Result<(), Error> {
        let wait = clock::duration_until(self.group.genesis_time);
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
        self.run_from(1, self.group.genesis_seed.clone(), cancel).await
    }

    /// Resumes production at the highest stored round + 1, without
    /// replaying history.
    pub async fn catchup(self: Arc<Self>, cancel: CancellationToken) -> Result<(), Error> {
        let (round, previous_signature) = self.last_or_genesis(&cancel).await?;
        self.run_from(round, previous_signature, cancel).await
    }

    async fn last_or_genesis(&self, cancel: &CancellationToken) -> Result<(u64, Vec<u8>), Error> {
        let store = self.store.clone();
        let token = cancel.clone();
        let last = tokio::task::spawn_blocking(move || store.last(&token))
            .await
            .map_err(|e| Error::Fatal(e.to_string()))?;
        match last {
            Ok(beacon) => Ok((beacon.round + 1, beacon.signature)),
            Err(beacon_store::Error::NotFound) => Ok((1, self.group.genesis_seed.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn run_from(self: Arc<Self>, mut round: u64, mut previous_signature: Vec<u8>, cancel: CancellationToken) -> Result<(), Error> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.run_round(round, previous_signature.clone(), &cancel).await? {
                RoundOutcome::Produced(beacon) => {
                    previous_signature = beacon.signature;
                    round += 1;
                }
                RoundOutcome::Missed => {
                    self.handle_missed_round(round, &cancel).await?;
                    round += 1;
                }
            }
        }
    }

    async fn run_round(&self, round: u64, previous_signature: Vec<u8>, cancel: &CancellationToken) -> Result<RoundOutcome, Error> {
        let init_wait = clock::duration_until(self.group.time_for_round(round));
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(init_wait) => {}
        }

        let message = self.group.scheme.message(&previous_signature, round);
        let mut collector = Collector::new(round, message, previous_signature.clone());

        let own_partial = sign_partial(&self.share, &message);
        collector.insert(&self.group, round, &previous_signature, own_partial.clone())?;
        self.transport
            .broadcast_partial(round, previous_signature.clone(), own_partial.to_bytes())
            .await;

        let deadline = clock::duration_until(self.group.time_for_round(round + 1))
            .saturating_sub(self.config.timeout_margin);

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(round, "round missed, no recovery before the deadline");
                Ok(RoundOutcome::Missed)
            }
            signature = self.collect_until_threshold(&mut collector) => {
                let beacon = Beacon { round, previous_signature, signature };
                self.persist_and_notify(beacon.clone(), cancel).await?;
                Ok(RoundOutcome::Produced(beacon))
            }
        }
    }

    async fn collect_until_threshold(&self, collector: &mut Collector) -> Vec<u8> {
        loop {
            let IncomingPartial { round, previous_signature, partial } = self.inbox.recv().await;
            if round > collector.round() {
                if let Some(tx) = &self.round_ahead_tx {
                    let _ = tx.send((partial.index, round));
                }
                continue;
            }
            if round < collector.round() {
                tracing::debug!(round, current = collector.round(), "dropping partial for a past round");
                continue;
            }
            match collector.insert(&self.group, round, &previous_signature, partial) {
                Ok(true) => match collector.try_recover(&self.group) {
                    Ok(Some(signature)) => return signature,
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "recovery attempt failed, waiting for more partials"),
                },
                Ok(false) => {}
                Err(e) => tracing::debug!(error = %e, "rejected partial"),
            }
        }
    }

    async fn persist_and_notify(&self, beacon: Beacon, cancel: &CancellationToken) -> Result<(), Error> {
        let store = self.store.clone();
        let token = cancel.clone();
        let to_put = beacon.clone();
        tokio::task::spawn_blocking(move || store.put(to_put, &token))
            .await
            .map_err(|e| Error::Fatal(e.to_string()))??;

        let callbacks: Vec<Callback> = self.callbacks.lock().clone();
        for callback in &callbacks {
            callback(&beacon);
        }
        Ok(())
    }

    /// §4.6 step 5: if the previous round is also missing, production
    /// suspends until the sync manager reports this chain caught up.
    async fn handle_missed_round(&self, round: u64, cancel: &CancellationToken) -> Result<(), Error> {
        if round == 1 {
            return Ok(());
        }
        let previous_present = {
            let store = self.store.clone();
            let token = cancel.clone();
            let result = tokio::task::spawn_blocking(move || store.get(round - 1, &token))
                .await
                .map_err(|e| Error::Fatal(e.to_string()))?;
            result.is_ok()
        };
        if previous_present {
            return Ok(());
        }
        if let Some(tx) = &self.sync_request_tx {
            let _ = tx.send(round - 1);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = self.sync_ready.notified() => Ok(()),
        }
    }
}
