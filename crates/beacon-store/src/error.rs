use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no beacon for the requested round")]
    NotFound,

    #[error("operation cancelled")]
    Cancelled,

    #[cfg(feature = "sled")]
    #[error(transparent)]
    Backend(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("{0}")]
    Other(String),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        use Error::*;
        match (self, other) {
            (NotFound, NotFound) => true,
            (Cancelled, Cancelled) => true,
            #[cfg(feature = "sled")]
            (Backend(_), Backend(_)) => true,
            (Encoding(a), Encoding(b)) => a == b,
            (Other(a), Other(b)) => a == b,
            _ => false,
        }
    }
}
