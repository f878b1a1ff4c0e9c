use thiserror::Error;

use crate::protocol::TransportError;

/// Every failure a [`Client`](crate::Client) can report.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid network address '{0}'")]
    InvalidAddress(String),

    #[error("host is not provided")]
    MissingHost,

    #[error("port is not provided")]
    MissingPort,

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("failed to connect to '{address}': {source}")]
    Connection {
        address: String,
        source: TransportError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("read timed out")]
    ReadTimeout,

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}
