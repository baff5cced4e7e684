//! The per-round partial-signature collector (§4.6 steps 3–4). Owned
//! exclusively by the round driver; never shared across rounds.
use std::collections::BTreeMap;
use std::sync::Arc;

use beacon_crypto::bls::{recover, verify, verify_partial, Partial};
use beacon_group::Group;

use crate::error::Error;

pub struct Collector {
    round: u64,
    message: [u8; 32],
    previous_signature: Vec<u8>,
    partials: BTreeMap<u32, Partial>,
    arrival_order: Vec<u32>,
    recovered: bool,
}

impl Collector {
    pub fn new(round: u64, message: [u8; 32], previous_signature: Vec<u8>) -> Self {
        Self {
            round,
            message,
            previous_signature,
            partials: BTreeMap::new(),
            arrival_order: Vec::new(),
            recovered: false,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Validates and inserts a partial arriving for this round. Returns
    /// `Ok(true)` once insertion brings the collector to the group's
    /// threshold and a recovery attempt has not yet been made.
    pub fn insert(
        &mut self,
        group: &Group,
        round: u64,
        previous_signature: &[u8],
        partial: Partial,
    ) -> Result<bool, Error> {
        if round != self.round {
            return Err(Error::ProtocolViolation(format!(
                "partial for round {round}, collector is at {}",
                self.round
            )));
        }
        if previous_signature != self.previous_signature.as_slice() {
            return Err(Error::ProtocolViolation(
                "partial carries a mismatched previous_signature".into(),
            ));
        }
        if self.partials.contains_key(&partial.index) {
            return Err(Error::ProtocolViolation(format!(
                "duplicate partial from index {}",
                partial.index
            )));
        }
        let ok = verify_partial(&group.public_poly, group.n(), &self.message, &partial)?;
        if !ok {
            return Err(Error::ProtocolViolation(format!(
                "partial from index {} failed verification",
                partial.index
            )));
        }
        self.arrival_order.push(partial.index);
        self.partials.insert(partial.index, partial);
        Ok(!self.recovered && self.partials.len() >= group.threshold as usize)
    }

    /// Attempts recovery once the threshold is met. On an internally
    /// inconsistent aggregate (individually-valid partials that do not
    /// recombine into a signature the group's public key accepts), the
    /// newest partial is dropped and the caller should wait for more.
    pub fn try_recover(&mut self, group: &Arc<Group>) -> Result<Option<Vec<u8>>, Error> {
        if self.recovered {
            return Ok(None);
        }
        let t = group.threshold as usize;
        if self.partials.len() < t {
            return Ok(None);
        }
        let partials: Vec<Partial> = self.partials.values().cloned().collect();
        let signature = recover(&partials, t)?;
        if verify(&group.public_poly.public_key(), &self.message, &signature).is_err() {
            if let Some(newest) = self.arrival_order.pop() {
                self.partials.remove(&newest);
            }
            return Ok(None);
        }
        self.recovered = true;
        Ok(Some(signature))
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }
}
