use thiserror::Error;

/// The engine's error kinds (§7). Only `Fatal` and `Cancelled` ever
/// leave a running engine; `ProtocolViolation` and `Transient` are
/// absorbed, logged, and counted internally.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no beacon at the requested round")]
    NotFound,

    #[error("operation cancelled")]
    Cancelled,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Crypto(#[from] beacon_crypto::Error),
}

impl From<beacon_store::Error> for Error {
    fn from(e: beacon_store::Error) -> Self {
        match e {
            beacon_store::Error::NotFound => Error::NotFound,
            beacon_store::Error::Cancelled => Error::Cancelled,
            other => Error::Transient(other.to_string()),
        }
    }
}
