use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{codec::Beacon, guard, ChainStore, Cursor, Error};

/// A bounded in-memory ring of the most recent beacons, ordered by
/// round. Out-of-order inserts are accepted and resorted (a `BTreeMap`
/// costs us nothing here); on overflow the lowest-round entries are
/// evicted first. Mirrors `node/db::MemoryDB`'s `Arc<RwLock<HashMap>>`
/// shape, swapped to a `BTreeMap` because the chain store needs
/// ordered range traversal that a hash map cannot give it.
#[derive(Clone)]
pub struct MemoryChainStore {
    inner: Arc<RwLock<BTreeMap<u64, Beacon>>>,
    capacity: usize,
}

impl MemoryChainStore {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "capacity must be at least 1");
        Self {
            inner: Arc::new(RwLock::new(BTreeMap::new())),
            capacity,
        }
    }
}

impl ChainStore for MemoryChainStore {
    fn put(&self, beacon: Beacon, cancel: &CancellationToken) -> Result<(), Error> {
        guard(cancel)?;
        let mut map = self.inner.write();
        map.entry(beacon.round).or_insert(beacon);
        while map.len() > self.capacity {
            let lowest = *map.keys().next().expect("map is non-empty");
            map.remove(&lowest);
            warn!(round = lowest, "evicted beacon past ring capacity");
        }
        Ok(())
    }

    fn get(&self, round: u64, cancel: &CancellationToken) -> Result<Beacon, Error> {
        guard(cancel)?;
        self.inner.read().get(&round).cloned().ok_or(Error::NotFound)
    }

    fn last(&self, cancel: &CancellationToken) -> Result<Beacon, Error> {
        guard(cancel)?;
        self.inner
            .read()
            .values()
            .next_back()
            .cloned()
            .ok_or(Error::NotFound)
    }

    fn len(&self) -> Result<u64, Error> {
        Ok(self.inner.read().len() as u64)
    }

    fn delete(&self, round: u64) -> Result<(), Error> {
        self.inner.write().remove(&round);
        Ok(())
    }

    fn cursor(&self) -> Result<Box<dyn Cursor + '_>, Error> {
        Ok(Box::new(MemoryCursor {
            snapshot: self.inner.read().clone(),
            position: None,
        }))
    }

    fn save_to(&self, writer: &mut dyn Write) -> Result<(), Error> {
        for beacon in self.inner.read().values() {
            let encoded = crate::codec::encode_value(beacon)?;
            writer
                .write_all(&(encoded.len() as u64).to_be_bytes())
                .and_then(|_| writer.write_all(&encoded))
                .map_err(|e| Error::Other(e.to_string()))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Reads a snapshot written by [`MemoryChainStore::save_to`] into a
/// fresh store. The length-prefixed framing mirrors `beacon_net`'s
/// wire codec so both paths share the same mental model.
pub fn load_from(reader: &mut dyn std::io::Read, capacity: usize) -> Result<MemoryChainStore, Error> {
    let store = MemoryChainStore::new(capacity.max(1));
    let mut len_buf = [0u8; 8];
    loop {
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::Other(e.to_string())),
        }
        let len = u64::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        reader
            .read_exact(&mut buf)
            .map_err(|e| Error::Other(e.to_string()))?;
        let beacon = crate::codec::decode_value(&buf)?;
        store.inner.write().insert(beacon.round, beacon);
    }
    Ok(store)
}

struct MemoryCursor {
    snapshot: BTreeMap<u64, Beacon>,
    position: Option<u64>,
}

impl Cursor for MemoryCursor {
    fn first(&mut self) -> Result<Beacon, Error> {
        let (round, beacon) = self.snapshot.iter().next().ok_or(Error::NotFound)?;
        self.position = Some(*round);
        Ok(beacon.clone())
    }

    fn last(&mut self) -> Result<Beacon, Error> {
        let (round, beacon) = self.snapshot.iter().next_back().ok_or(Error::NotFound)?;
        self.position = Some(*round);
        Ok(beacon.clone())
    }

    fn next(&mut self) -> Result<Beacon, Error> {
        let start = self.position.map(|r| r + 1).unwrap_or(0);
        let (round, beacon) = self
            .snapshot
            .range(start..)
            .next()
            .ok_or(Error::NotFound)?;
        self.position = Some(*round);
        Ok(beacon.clone())
    }

    fn seek(&mut self, round: u64) -> Result<Beacon, Error> {
        let (found, beacon) = self.snapshot.range(round..).next().ok_or(Error::NotFound)?;
        self.position = Some(*found);
        Ok(beacon.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(round: u64) -> Beacon {
        Beacon {
            round,
            previous_signature: vec![0; 4],
            signature: vec![round as u8; 4],
        }
    }

    #[test]
    fn round_trip_and_last() {
        let store = MemoryChainStore::new(10);
        let token = CancellationToken::new();
        for r in 1..=5 {
            store.put(beacon(r), &token).unwrap();
        }
        assert_eq!(store.get(3, &token).unwrap(), beacon(3));
        assert_eq!(store.last(&token).unwrap().round, 5);
        assert_eq!(store.len().unwrap(), 5);
    }

    #[test]
    fn put_is_idempotent() {
        let store = MemoryChainStore::new(10);
        let token = CancellationToken::new();
        store.put(beacon(1), &token).unwrap();
        store.put(beacon(1), &token).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn capacity_evicts_lowest_rounds() {
        let store = MemoryChainStore::new(3);
        let token = CancellationToken::new();
        for r in 1..=5 {
            store.put(beacon(r), &token).unwrap();
        }
        assert_eq!(store.len().unwrap(), 3);
        assert!(store.get(1, &token).is_err());
        assert!(store.get(2, &token).is_err());
        assert_eq!(store.get(5, &token).unwrap().round, 5);
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let store = MemoryChainStore::new(3);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(store.put(beacon(1), &token), Err(Error::Cancelled)));
    }

    #[test]
    fn cursor_walks_in_order_with_gaps() {
        let store = MemoryChainStore::new(10);
        let token = CancellationToken::new();
        for r in [1u64, 3, 5] {
            store.put(beacon(r), &token).unwrap();
        }
        let mut cursor = store.cursor().unwrap();
        assert_eq!(cursor.first().unwrap().round, 1);
        assert_eq!(cursor.next().unwrap().round, 3);
        assert_eq!(cursor.next().unwrap().round, 5);
        assert!(matches!(cursor.next(), Err(Error::NotFound)));
        assert_eq!(cursor.seek(2).unwrap().round, 3);
    }

    #[test]
    fn save_and_load_round_trips() {
        let store = MemoryChainStore::new(100);
        let token = CancellationToken::new();
        for r in 1..=10 {
            store.put(beacon(r), &token).unwrap();
        }
        let mut buf = Vec::new();
        store.save_to(&mut buf).unwrap();
        let restored = load_from(&mut buf.as_slice(), 100).unwrap();
        assert_eq!(restored.len().unwrap(), 10);
        for r in 1..=10 {
            assert_eq!(restored.get(r, &token).unwrap(), beacon(r));
        }
    }
}
