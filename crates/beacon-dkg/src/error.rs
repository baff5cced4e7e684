use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("packet from non-member index {0}")]
    NotAMember(u32),

    #[error("duplicate {kind} from index {index}")]
    Duplicate { kind: &'static str, index: u32 },

    #[error("share decryption failed")]
    Decryption,

    #[error("share failed verification against the dealer's commitments")]
    InvalidShare,

    #[error("own contribution was rejected, cannot continue dealing")]
    OwnDealRejected,

    #[error("qualified set of size {have} is below the threshold {need}")]
    BelowThreshold { need: usize, have: usize },

    #[error("operation invalid in phase {0:?}")]
    WrongPhase(crate::state::Phase),

    #[error(transparent)]
    Crypto(#[from] beacon_crypto::Error),

    #[error(transparent)]
    Group(#[from] beacon_group::Error),
}
