use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no peers available to sync from")]
    NoPeers,

    #[error("operation cancelled")]
    Cancelled,

    #[error("peer sent a beacon that failed validation: {0}")]
    InvalidBeacon(String),

    #[error("peer connection failed: {0}")]
    PeerUnavailable(String),

    #[error("no progress made within the configured window")]
    StalledAttempt,

    #[error(transparent)]
    Crypto(#[from] beacon_crypto::Error),
}

impl From<beacon_store::Error> for Error {
    fn from(e: beacon_store::Error) -> Self {
        match e {
            beacon_store::Error::Cancelled => Error::Cancelled,
            other => Error::PeerUnavailable(other.to_string()),
        }
    }
}
