//! The group model: an immutable description of one beacon committee,
//! loaded from a canonically-hashed document. Generalizes
//! `blockchain/beacon`'s single hard-coded Drand mainnet `Group` to an
//! arbitrary committee with a predecessor link for resharing.

pub mod error;
pub mod round;

pub use error::Error;

use beacon_crypto::{PublicPoly, SchemeId};
use blstrs::G1Affine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single committee member: its stable index (`1..=n`, the exponent
/// used throughout `beacon_crypto`'s polynomial evaluations), its
/// network address, its long-term authentication key (consumed by
/// `beacon_net` to authenticate the libp2p identity presented on
/// connection, and reinterpreted by `beacon_dkg` as an X25519 key for
/// share encryption), and its long-term Ed25519 signing key, which
/// authenticates DKG packets carrying this member's claimed index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub index: u32,
    pub address: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signing_key: Vec<u8>,
}

/// The wire/document form of a [`Group`]: every field is plain data so
/// it round-trips through JSON and hashes deterministically. `Group`
/// itself carries the richer `beacon_crypto` types built from this.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupDocument {
    pub scheme: SchemeId,
    pub period_secs: u64,
    pub genesis_time: u64,
    pub transition_time: Option<u64>,
    pub threshold: u32,
    pub members: Vec<Member>,
    #[serde(with = "hex_bytes_vec")]
    pub public_key_commits: Vec<Vec<u8>>,
    #[serde(with = "hex_bytes")]
    pub genesis_seed: Vec<u8>,
    #[serde(with = "hex_bytes_opt")]
    pub predecessor_hash: Option<Vec<u8>>,
}

/// An immutable, validated committee. Holds the richer
/// `beacon_crypto::PublicPoly` in place of the document's raw
/// commitment bytes, and is addressed everywhere else by `Arc<Group>`.
#[derive(Clone, Debug)]
pub struct Group {
    pub scheme: SchemeId,
    pub period_secs: u64,
    pub genesis_time: u64,
    pub transition_time: Option<u64>,
    pub threshold: u32,
    pub members: Vec<Member>,
    pub public_poly: PublicPoly,
    pub genesis_seed: Vec<u8>,
    pub predecessor_hash: Option<[u8; 32]>,
    hash: [u8; 32],
}

/// `floor(n/2) + 1`, the smallest threshold at which no two disjoint
/// subsets of members can each independently produce a valid beacon.
/// Mirrors `blockchain/beacon::group::minimum_threshold`.
pub fn minimum_threshold(n: usize) -> u32 {
    ((n as f64 / 2.0).floor() + 1.0) as u32
}

impl Group {
    pub fn document_hash(doc: &GroupDocument) -> [u8; 32] {
        let canonical = serde_json::to_vec(doc).expect("GroupDocument always serializes");
        Sha256::digest(canonical).into()
    }

    /// The client-visible chain identifier, the hash over the
    /// canonical encoding of the group's immutable fields.
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn n(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn by_index(&self, index: u32) -> Option<&Member> {
        self.members.iter().find(|m| m.index == index)
    }

    pub fn by_public_key(&self, key: &[u8]) -> Option<&Member> {
        self.members.iter().find(|m| m.public_key == key)
    }

    pub fn round_at_time(&self, time: u64) -> u64 {
        round::round_at_time(self.genesis_time, self.period_secs, time)
    }

    pub fn time_for_round(&self, round: u64) -> u64 {
        round::time_for_round(self.genesis_time, self.period_secs, round)
    }
}

impl TryFrom<GroupDocument> for Group {
    type Error = Error;

    fn try_from(doc: GroupDocument) -> Result<Self, Self::Error> {
        let n = doc.members.len();
        let minimum = minimum_threshold(n);
        if doc.threshold < minimum {
            return Err(Error::InvalidThreshold {
                threshold: doc.threshold,
                minimum,
                n: n as u32,
            });
        }
        if doc.genesis_time == 0 {
            return Err(Error::ZeroGenesis);
        }
        if doc.period_secs == 0 {
            return Err(Error::ZeroPeriod);
        }
        if matches!(doc.scheme, SchemeId::UnchainedBls12381) {
            return Err(Error::UnsupportedScheme(doc.scheme));
        }
        let mut seen = std::collections::HashSet::new();
        for m in &doc.members {
            if !seen.insert(m.index) {
                return Err(Error::DuplicateIndex(m.index));
            }
        }
        if doc.public_key_commits.len() != doc.threshold as usize {
            return Err(Error::MismatchedCommitLen);
        }
        let commits: Vec<G1Affine> = doc
            .public_key_commits
            .iter()
            .map(|bytes| {
                let arr: [u8; 48] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Malformed("public key commit must be 48 bytes".into()))?;
                let affine: Option<G1Affine> = G1Affine::from_compressed(&arr).into();
                affine.ok_or_else(|| Error::Malformed("invalid G1 commitment".into()))
            })
            .collect::<Result<_, _>>()?;
        let predecessor_hash = doc
            .predecessor_hash
            .as_ref()
            .map(|bytes| -> Result<[u8; 32], Error> {
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Malformed("predecessor hash must be 32 bytes".into()))
            })
            .transpose()?;
        let hash = Self::document_hash(&doc);
        Ok(Self {
            scheme: doc.scheme,
            period_secs: doc.period_secs,
            genesis_time: doc.genesis_time,
            transition_time: doc.transition_time,
            threshold: doc.threshold,
            members: doc.members,
            public_poly: PublicPoly::from_commits(commits),
            genesis_seed: doc.genesis_seed,
            predecessor_hash,
            hash,
        })
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for bytes in v {
            seq.serialize_element(&hex::encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(d)?;
        strings
            .into_iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s = Option::<String>::deserialize(d)?;
        s.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> GroupDocument {
        use beacon_crypto::Poly;
        use rand::SeedableRng;
        let mut rng = rand_chacha_for_test();
        let poly = Poly::random(1, &mut rng);
        let commits = poly
            .commit()
            .commits()
            .iter()
            .map(|c| c.to_compressed().to_vec())
            .collect();
        GroupDocument {
            scheme: SchemeId::ChainedBls12381,
            period_secs: 3,
            genesis_time: 1_700_000_000,
            transition_time: None,
            threshold: 2,
            members: vec![
                Member { index: 1, address: "node-1:9000".into(), public_key: vec![1; 32], signing_key: vec![11; 32] },
                Member { index: 2, address: "node-2:9000".into(), public_key: vec![2; 32], signing_key: vec![12; 32] },
                Member { index: 3, address: "node-3:9000".into(), public_key: vec![3; 32], signing_key: vec![13; 32] },
            ],
            public_key_commits: commits,
            genesis_seed: vec![0xab; 32],
            predecessor_hash: None,
        }
    }

    fn rand_chacha_for_test() -> rand_chacha::ChaCha8Rng {
        use rand::SeedableRng;
        rand_chacha::ChaCha8Rng::seed_from_u64(99)
    }

    #[test]
    fn validates_and_hashes() {
        let doc = sample_doc();
        let group = Group::try_from(doc.clone()).unwrap();
        assert_eq!(group.n(), 3);
        assert_eq!(group.hash(), Group::document_hash(&doc));
    }

    #[test]
    fn rejects_below_minimum_threshold() {
        let mut doc = sample_doc();
        doc.threshold = 1;
        doc.public_key_commits.truncate(1);
        assert!(matches!(
            Group::try_from(doc),
            Err(Error::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_index() {
        let mut doc = sample_doc();
        doc.members[1].index = 1;
        assert!(matches!(Group::try_from(doc), Err(Error::DuplicateIndex(1))));
    }

    #[test]
    fn rejects_unchained_scheme_at_startup() {
        let mut doc = sample_doc();
        doc.scheme = SchemeId::UnchainedBls12381;
        assert!(matches!(Group::try_from(doc), Err(Error::UnsupportedScheme(_))));
    }
}
