use thiserror::Error;

/// Transport-level errors, distinguished from application-level
/// rejections (`BeaconResponse::Rejected`, `DkgResponse::Rejected`)
/// per §4.3: a `Transport` error means the connection or protocol
/// negotiation itself failed, not that a peer disagreed with the
/// request's contents.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no known address for peer")]
    UnknownPeer,

    #[error("dial failed: {0}")]
    DialFailure(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    #[error("unsupported protocol")]
    UnsupportedProtocol,

    #[error("peer rejected the request: {0}")]
    Rejected(String),

    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<libp2p::request_response::OutboundFailure> for Error {
    fn from(failure: libp2p::request_response::OutboundFailure) -> Self {
        use libp2p::request_response::OutboundFailure::*;
        match failure {
            DialFailure => Error::DialFailure("dial failed".into()),
            Timeout => Error::Timeout,
            ConnectionClosed => Error::ConnectionClosed,
            UnsupportedProtocols => Error::UnsupportedProtocol,
            Io(e) => Error::Io(e),
        }
    }
}
