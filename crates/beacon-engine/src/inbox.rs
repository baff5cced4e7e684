//! The engine's incoming-partial queue (§5, "Shared resources"): a
//! bounded, drop-oldest buffer the transport layer feeds and the round
//! driver drains. Built directly on `parking_lot`/`tokio::sync::Notify`
//! rather than `tokio::sync::mpsc`, since `mpsc`'s only overflow policy
//! is backpressure, not eviction.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use beacon_crypto::bls::Partial;
use parking_lot::Mutex;
use tokio::sync::Notify;

pub struct IncomingPartial {
    pub round: u64,
    pub previous_signature: Vec<u8>,
    pub partial: Partial,
}

pub struct PartialInbox {
    capacity: usize,
    queue: Mutex<VecDeque<IncomingPartial>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl PartialInbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, item: IncomingPartial) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(total_dropped = total, "partial inbox full, dropped oldest entry");
        }
        queue.push_back(item);
        drop(queue);
        self.notify.notify_one();
    }

    pub async fn recv(&self) -> IncomingPartial {
        loop {
            if let Some(item) = self.queue.lock().pop_front() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
