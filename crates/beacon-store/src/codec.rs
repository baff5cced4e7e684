use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A persisted randomness beacon: `round` plus the two signatures that
/// tie it into the chain (see `beacon_crypto::scheme` for how
/// `signature` is produced from `previous_signature` and `round`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub round: u64,
    pub previous_signature: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Beacon {
    /// `SHA-256(signature)`, the client-visible randomness value.
    pub fn randomness(&self) -> [u8; 32] {
        beacon_crypto::randomness(&self.signature)
    }
}

/// The on-disk key for a round: 8-byte big-endian, so that a
/// lexicographic range scan over keys is also a numeric range scan
/// over rounds. Mirrors `node/db`'s convention of hashing or
/// byte-ordering keys so backend-native range iteration stays useful.
pub fn encode_key(round: u64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, round);
    buf
}

pub fn decode_key(bytes: &[u8]) -> Option<u64> {
    if bytes.len() != 8 {
        return None;
    }
    Some(BigEndian::read_u64(bytes))
}

/// The canonical stable encoding for a beacon value. CBOR (via
/// `cbor4ii`, already this workspace's marshal format for
/// struct-shaped records) rather than a hand-rolled layout, so adding a
/// field later does not require a migration.
pub fn encode_value(beacon: &Beacon) -> Result<Vec<u8>, Error> {
    cbor4ii::serde::to_vec(Vec::new(), beacon).map_err(|e| Error::Encoding(e.to_string()))
}

pub fn decode_value(bytes: &[u8]) -> Result<Beacon, Error> {
    cbor4ii::serde::from_slice(bytes).map_err(|e| Error::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips() {
        for round in [0u64, 1, 42, u64::MAX] {
            assert_eq!(decode_key(&encode_key(round)), Some(round));
        }
    }

    #[quickcheck_macros::quickcheck]
    fn value_round_trips(round: u64, prev: Vec<u8>, sig: Vec<u8>) -> bool {
        let beacon = Beacon {
            round,
            previous_signature: prev,
            signature: sig,
        };
        let encoded = encode_value(&beacon).unwrap();
        decode_value(&encoded).unwrap() == beacon
    }
}
