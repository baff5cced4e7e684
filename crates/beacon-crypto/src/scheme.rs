use byteorder::{BigEndian, WriteBytesExt};
use sha2::{Digest, Sha256};

/// Identifies the message-construction rule a group uses. Some scheme
/// variants bind the signed message to the previous signature (making
/// the chain self-certifying beyond the store's own linkage); others
/// sign only the round, verifiable without access to chain history.
///
/// Selecting the wrong variant for a group is a configuration error,
/// not a data error: it is checked once at startup rather than per
/// message (see `beacon_group::Group::try_from`, which rejects
/// `UnchainedBls12381` outright since `beacon_engine` only drives the
/// chained scheme today).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SchemeId {
    /// `H(previous_signature || round)`. The default and only scheme
    /// this workspace drives to completion; see `Unchained` for the
    /// recognized-but-unimplemented alternative.
    ChainedBls12381,
    /// `H(round)` only. Recognized for forward compatibility with
    /// schemes that do not chain; not driven by `beacon_engine` today.
    UnchainedBls12381,
}

impl SchemeId {
    /// Builds the 32-byte message that gets BLS-signed for `round`,
    /// given the previous round's signature (ignored for unchained
    /// schemes but always supplied by the caller for uniformity).
    pub fn message(self, previous_signature: &[u8], round: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        match self {
            SchemeId::ChainedBls12381 => {
                hasher.update(previous_signature);
                let mut round_be = Vec::with_capacity(8);
                round_be.write_u64::<BigEndian>(round).expect("vec write cannot fail");
                hasher.update(&round_be);
            }
            SchemeId::UnchainedBls12381 => {
                let mut round_be = Vec::with_capacity(8);
                round_be.write_u64::<BigEndian>(round).expect("vec write cannot fail");
                hasher.update(&round_be);
            }
        }
        hasher.finalize().into()
    }
}

/// `SHA-256(signature)`, the public randomness derived from a beacon.
/// Kept alongside [`SchemeId`] because every scheme variant derives
/// randomness the same way regardless of its message rule.
pub fn randomness(signature: &[u8]) -> [u8; 32] {
    Sha256::digest(signature).into()
}
