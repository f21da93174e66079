// ABOUTME: Frame-level RESP3 I/O over an arbitrary async byte stream
// ABOUTME: Pairs a Resp3Decoder with a buffered writer and tracks per-connection handshake state

use crate::decoder::{DecodeError, Resp3Decoder};
use crate::value::Value;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// Any duplex byte stream a [`Connection`] can be built on: a live TCP
/// socket in production, an in-memory duplex pipe or test listener in tests.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// Errors from the connection's frame-level I/O. Distinct from
/// [`crate::client::error::EngineError`]: the engine wraps these when
/// surfacing failures to callers.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed by peer")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Establishes a fresh transport connection. Implemented by [`TcpConnect`]
/// for production use; test harnesses provide their own implementor wired to
/// an in-process fake server.
pub trait Connect: Send + Sync + 'static {
    type Stream: ByteStream + 'static;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl std::future::Future<Output = std::io::Result<Self::Stream>> + Send;
}

/// Default [`Connect`] implementor: opens a plain TCP connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnect;

impl Connect for TcpConnect {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<TcpStream> {
        TcpStream::connect((host, port)).await
    }
}

/// A single physical connection's frame-level read/write half, pairing a
/// buffered writer with a resumable [`Resp3Decoder`].
///
/// Owns exactly one decoder for its lifetime, satisfying the requirement
/// that decoder state never be shared or reset mid-stream: a decoder that
/// has buffered a partial value belongs to this connection until the value
/// completes.
#[derive(Debug)]
pub struct Connection<S: ByteStream> {
    stream: BufWriter<S>,
    decoder: Resp3Decoder,
    hello_done: bool,
}

impl<S: ByteStream> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufWriter::new(stream),
            decoder: Resp3Decoder::new(),
            hello_done: false,
        }
    }

    pub fn hello_done(&self) -> bool {
        self.hello_done
    }

    pub fn mark_hello_done(&mut self) {
        self.hello_done = true;
    }

    /// Writes an already-encoded request and flushes it.
    #[tracing::instrument(level = "trace", skip(self, request))]
    pub async fn write_request(&mut self, request: &Bytes) -> Result<(), ConnectionError> {
        self.stream.write_all(request).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads and returns the next complete value, pulling more bytes off the
    /// socket as needed. Returns [`ConnectionError::Closed`] if the peer
    /// closes the stream, whether between values or in the middle of one.
    /// Either way the caller's only recourse is a new connection, so the
    /// distinction carries no actionable information here.
    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn read_value(&mut self) -> Result<Value, ConnectionError> {
        loop {
            if let Some(value) = self.decoder.get_object()? {
                return Ok(value);
            }

            let n = self.stream.read_buf(self.decoder.raw_buffer_mut()).await?;
            if n == 0 {
                return Err(ConnectionError::Closed);
            }
        }
    }
}
