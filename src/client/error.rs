// ABOUTME: Error type surfaced by Engine, wrapping pool/connection/protocol failures

use crate::connection::ConnectionError;
use crate::decoder::DecodeError;
use crate::pool::PoolError;
use thiserror::Error;

/// Errors surfaced by [`crate::client::engine::Engine`].
///
/// `Protocol` wraps a [`DecodeError`] rather than duplicating its variants.
/// The decoder's fatal-vs-incomplete distinction belongs to the decoder; the
/// engine only needs to know decoding failed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("HELLO handshake failed: {0}")]
    Handshake(String),
}

impl From<ConnectionError> for EngineError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Closed => EngineError::ConnectionClosed,
            ConnectionError::Protocol(e) => EngineError::Protocol(e),
            ConnectionError::Io(e) => EngineError::Io(e),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
