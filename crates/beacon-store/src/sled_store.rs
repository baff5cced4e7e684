use std::io::Write;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::codec::{decode_key, decode_value, encode_key, encode_value};
use crate::{guard, Beacon, ChainStore, Cursor, Error};

/// Durable chain store backed by `sled`, a pure-Rust embedded store
/// that needs no native toolchain — the same role `node/db`'s
/// feature-gated `rocksdb`/`parity-db` backends play, minus the build
/// dependency. Mirrors `node/db::sled::SledDb`'s open/temporary split.
pub struct SledChainStore {
    db: sled::Db,
}

impl SledChainStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let db = sled::Config::default()
            .path(path)
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }

    /// An ephemeral store for tests, never touching disk persistently.
    pub fn temporary() -> Result<Self, Error> {
        let db = sled::Config::default().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl ChainStore for SledChainStore {
    fn put(&self, beacon: Beacon, cancel: &CancellationToken) -> Result<(), Error> {
        guard(cancel)?;
        let key = encode_key(beacon.round);
        if self.db.contains_key(key)? {
            return Ok(());
        }
        let value = encode_value(&beacon)?;
        self.db.insert(key, value)?;
        Ok(())
    }

    fn get(&self, round: u64, cancel: &CancellationToken) -> Result<Beacon, Error> {
        guard(cancel)?;
        let bytes = self.db.get(encode_key(round))?.ok_or(Error::NotFound)?;
        decode_value(&bytes)
    }

    fn last(&self, cancel: &CancellationToken) -> Result<Beacon, Error> {
        guard(cancel)?;
        let (_, bytes) = self.db.last()?.ok_or(Error::NotFound)?;
        decode_value(&bytes)
    }

    fn len(&self) -> Result<u64, Error> {
        Ok(self.db.len() as u64)
    }

    fn delete(&self, round: u64) -> Result<(), Error> {
        self.db.remove(encode_key(round))?;
        Ok(())
    }

    fn cursor(&self) -> Result<Box<dyn Cursor + '_>, Error> {
        Ok(Box::new(SledCursor {
            db: &self.db,
            position: None,
        }))
    }

    fn save_to(&self, writer: &mut dyn Write) -> Result<(), Error> {
        for item in self.db.iter() {
            let (_, bytes) = item?;
            writer
                .write_all(&(bytes.len() as u64).to_be_bytes())
                .and_then(|_| writer.write_all(&bytes))
                .map_err(|e| Error::Other(e.to_string()))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

struct SledCursor<'a> {
    db: &'a sled::Db,
    position: Option<u64>,
}

impl Cursor for SledCursor<'_> {
    fn first(&mut self) -> Result<Beacon, Error> {
        let (key, bytes) = self.db.first()?.ok_or(Error::NotFound)?;
        self.position = decode_key(&key);
        decode_value(&bytes)
    }

    fn last(&mut self) -> Result<Beacon, Error> {
        let (key, bytes) = self.db.last()?.ok_or(Error::NotFound)?;
        self.position = decode_key(&key);
        decode_value(&bytes)
    }

    fn next(&mut self) -> Result<Beacon, Error> {
        let start = self.position.map(|r| r + 1).unwrap_or(0);
        let (key, bytes) = self
            .db
            .range(encode_key(start)..)
            .next()
            .transpose()?
            .ok_or(Error::NotFound)?;
        self.position = decode_key(&key);
        decode_value(&bytes)
    }

    fn seek(&mut self, round: u64) -> Result<Beacon, Error> {
        let (key, bytes) = self
            .db
            .range(encode_key(round)..)
            .next()
            .transpose()?
            .ok_or(Error::NotFound)?;
        self.position = decode_key(&key);
        decode_value(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(round: u64) -> Beacon {
        Beacon {
            round,
            previous_signature: vec![1, 2, 3],
            signature: vec![round as u8; 4],
        }
    }

    #[test]
    fn round_trip() {
        let store = SledChainStore::temporary().unwrap();
        let token = CancellationToken::new();
        store.put(beacon(1), &token).unwrap();
        store.put(beacon(2), &token).unwrap();
        assert_eq!(store.get(1, &token).unwrap(), beacon(1));
        assert_eq!(store.last(&token).unwrap().round, 2);
    }

    #[test]
    fn cursor_seek_skips_gaps() {
        let store = SledChainStore::temporary().unwrap();
        let token = CancellationToken::new();
        for r in [1u64, 4, 7] {
            store.put(beacon(r), &token).unwrap();
        }
        let mut cursor = store.cursor().unwrap();
        assert_eq!(cursor.seek(2).unwrap().round, 4);
        assert_eq!(cursor.next().unwrap().round, 7);
    }

    #[test]
    fn snapshot_round_trips_through_memory_loader() {
        let store = SledChainStore::temporary().unwrap();
        let token = CancellationToken::new();
        for r in 1..=5 {
            store.put(beacon(r), &token).unwrap();
        }
        let mut buf = Vec::new();
        store.save_to(&mut buf).unwrap();
        let restored = crate::memory::load_from(&mut buf.as_slice(), 100).unwrap();
        assert_eq!(restored.len().unwrap(), 5);
    }
}
