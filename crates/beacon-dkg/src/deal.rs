//! The three packet kinds exchanged during a ceremony. Wire framing and
//! signing live in `beacon_net::messages::DkgRequest`; these are the
//! richer, validated in-memory forms `participant` works with.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto_box::SealedShare;

/// A dealer's contribution: commitments to its sharing polynomial, and
/// one share sealed per recipient in the new group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deal {
    pub dealer_index: u32,
    /// Compressed G1 points, one per coefficient, lowest degree first.
    pub commitments: Vec<[u8; 48]>,
    pub shares: BTreeMap<u32, SealedShare>,
}

/// A recipient's verdict on a dealer's deal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Response {
    Approval,
    Complaint { reason: String },
}

/// A dealer's answer to a complaint: the plaintext share it sent the
/// complainant, published so every other participant can verify it
/// against the dealer's own commitments without needing the
/// complainant's private key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Justification {
    pub dealer_index: u32,
    pub responder_index: u32,
    pub share: [u8; 32],
}
