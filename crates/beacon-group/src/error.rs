use beacon_crypto::SchemeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("threshold {threshold} is below the minimum {minimum} for {n} members")]
    InvalidThreshold { threshold: u32, minimum: u32, n: u32 },

    #[error("scheme {0:?} is recognized but not driven to completion by this engine")]
    UnsupportedScheme(SchemeId),

    #[error("genesis time must not be zero")]
    ZeroGenesis,

    #[error("period must not be zero")]
    ZeroPeriod,

    #[error("duplicate member index {0}")]
    DuplicateIndex(u32),

    #[error("public key commitment count does not match threshold")]
    MismatchedCommitLen,

    #[error("malformed group document: {0}")]
    Malformed(String),
}
