//! Asynchronous RESP3 decoding/encoding and a connection-pool-backed
//! request/reply engine.
//!
//! This crate covers the transport-adjacent core of a RESP3 client: parsing
//! and producing wire frames, and dispatching requests over a bounded pool
//! of connections while routing server-initiated pushes to callbacks. It
//! does not provide a typed command surface (`GET`, `HSET`, ...): callers
//! build commands out of byte slices and get back a [`Value`] tree.
//!
//! ```rust,no_run
//! use resp3_client::{Engine, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(PoolConfig::new("localhost", 6379));
//!     let reply = engine.call(b"PING", &[]).await?;
//!     println!("{reply:?}");
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod client;
pub mod connection;
pub mod decoder;
pub mod encoder;
pub mod pool;
pub mod value;


pub use client::{Engine, EngineError, EngineResult, PushCallback};
pub use connection::{ByteStream, Connect, Connection, ConnectionError, TcpConnect};
pub use decoder::{DecodeError, Resp3Decoder};
pub use encoder::encode_request;
pub use pool::{ConnectionPool, PoolConfig, PoolError, PooledConnection};
pub use value::Value;
