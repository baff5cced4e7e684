use thiserror::Error;

/// Errors produced by the cryptographic provider.
///
/// These map onto the error kinds distinguished by callers (see
/// `beacon_engine`): `InvalidIndex`/`DuplicateIndex`/`Malformed` are
/// protocol violations from a peer, `Threshold` is a local precondition
/// failure, `Verification` is a rejected signature or proof.
#[derive(Debug, Error)]
pub enum Error {
    #[error("participant index {0} is outside the group bound [1, {1}]")]
    InvalidIndex(u32, u32),

    #[error("duplicate contribution for index {0}")]
    DuplicateIndex(u32),

    #[error("need {need} partials to recover, have {have}")]
    Threshold { need: usize, have: usize },

    #[error("malformed encoding: {0}")]
    Malformed(String),

    #[error("signature verification failed")]
    Verification,

    #[error(transparent)]
    Bls(#[from] bls_signatures::Error),
}
