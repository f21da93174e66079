// ABOUTME: Request/reply engine. Dispatches commands over a pooled connection,
// ABOUTME: routes server-initiated pushes to registered callbacks, returns the next reply

use crate::client::error::{EngineError, EngineResult};
use crate::connection::{Connect, TcpConnect};
use crate::encoder::encode_request;
use crate::pool::{ConnectionPool, PoolConfig, PooledConnection};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Called with a push value's full body whenever one arrives for its
/// registered kind. Errors or panics propagate straight out of whichever
/// [`Engine::receive`]/[`Engine::call`] happened to be reading at the time.
/// This crate does not catch callback failures on the caller's behalf.
pub type PushCallback = Arc<dyn Fn(Value) + Send + Sync>;

type PushRegistry = Arc<Mutex<HashMap<Vec<u8>, Vec<PushCallback>>>>;

/// Command words that put a connection into a state where the next server
/// message on it is a push rather than an ordinary reply, per the RESP3
/// protocol's pub/sub subscribe handshake. `call` consults this to decide
/// whether `receive` should stop as soon as the subscribe confirmation push
/// arrives instead of waiting for a further non-push reply that a
/// subscribed connection will never send.
const PUSH_COMMANDS: &[&[u8]] = &[b"SUBSCRIBE", b"PSUBSCRIBE", b"UNSUBSCRIBE", b"PUNSUBSCRIBE"];

fn is_push_command(command: &[u8]) -> bool {
    PUSH_COMMANDS.iter().any(|c| c.eq_ignore_ascii_case(command))
}

/// Request/reply engine for a RESP3 server.
///
/// Cheaply `Clone`: all state is `Arc`-backed, so concurrent callers each
/// hold an owned handle and only race inside the underlying
/// [`ConnectionPool`].
pub struct Engine<C: Connect = TcpConnect> {
    pool: ConnectionPool<C>,
    push_callbacks: PushRegistry,
}

impl<C: Connect> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self { pool: self.pool.clone(), push_callbacks: self.push_callbacks.clone() }
    }
}

impl Engine<TcpConnect> {
    pub fn new(config: PoolConfig) -> Self {
        Self::new_with_connector(config, TcpConnect)
    }
}

impl<C: Connect> Engine<C> {
    pub fn new_with_connector(config: PoolConfig, connector: C) -> Self {
        Self {
            pool: ConnectionPool::with_connector(config, connector),
            push_callbacks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Appends `callback` to the ordered list invoked for pushes of the
    /// given kind (e.g. `b"message"`, `b"subscribe"`). Safe to call at any
    /// time, including while other calls are in flight: the registry is
    /// shared behind a mutex, not snapshotted per call. Multiple callbacks
    /// registered for the same kind all fire, in registration order; there
    /// is no removal, matching the source this crate is grounded on.
    pub async fn register_push_callback(&self, kind: impl Into<Vec<u8>>, callback: PushCallback) {
        self.push_callbacks.lock().await.entry(kind.into()).or_default().push(callback);
    }

    /// Writes `command args...` on `connection` if one is supplied, or on a
    /// freshly acquired pooled connection otherwise, running the `HELLO 3`
    /// handshake first if this is the connection's first use. Returns the
    /// connection so the caller can pair it with a later [`Engine::receive`]
    /// call: the explicit `send`/`receive` split that `call` is built on
    /// top of.
    #[tracing::instrument(level = "debug", skip(self, args, connection))]
    pub async fn send(
        &self,
        command: &[u8],
        args: &[&[u8]],
        connection: Option<PooledConnection<C>>,
    ) -> EngineResult<PooledConnection<C>> {
        let mut conn = match connection {
            Some(conn) => conn,
            None => self.pool.acquire().await?,
        };
        self.ensure_handshake(&mut conn).await?;

        let request = encode_request(command, args);
        conn.write_request(&request).await?;
        Ok(conn)
    }

    /// Reads values off `connection` until a non-push reply arrives,
    /// dispatching each push to its registered callbacks (or dropping it
    /// silently if none are registered for its kind) before continuing to
    /// read. If `push_only` is set, returns `Ok(None)` as soon as the first
    /// push has been dispatched instead of continuing to wait for a reply
    /// that will never come: the case of a connection that just entered
    /// subscribe mode, where every further server message is a push.
    #[tracing::instrument(level = "debug", skip(self, connection))]
    pub async fn receive(
        &self,
        connection: &mut PooledConnection<C>,
        push_only: bool,
    ) -> EngineResult<Option<Value>> {
        loop {
            let value = connection.read_value().await?;
            if !value.is_push() {
                return Ok(Some(value));
            }
            self.dispatch_push(value).await;
            if push_only {
                return Ok(None);
            }
        }
    }

    /// Sends `command args...`, waits for its reply (or, for the
    /// subscribe-family commands, for the subscribe confirmation push),
    /// then releases the connection back to the pool.
    ///
    /// Acquires one pooled connection for the duration of the call. On
    /// cancellation (the returned future dropped before completion) the
    /// connection is discarded rather than returned to the pool, per the
    /// pool's cancellation-safety contract. This happens automatically
    /// because the `PooledConnection` guard's `Drop` runs during unwind
    /// before any explicit `release()` can.
    #[tracing::instrument(level = "debug", skip(self, args))]
    pub async fn call(&self, command: &[u8], args: &[&[u8]]) -> EngineResult<Option<Value>> {
        let mut conn = self.send(command, args, None).await?;
        let result = self.receive(&mut conn, is_push_command(command)).await?;
        conn.release().await;
        Ok(result)
    }

    async fn dispatch_push(&self, value: Value) {
        let kind = value.push_kind().map(|k| k.to_vec());
        let callbacks = match &kind {
            Some(kind) => self.push_callbacks.lock().await.get(kind).cloned(),
            None => None,
        };
        match callbacks {
            Some(callbacks) => {
                for callback in callbacks {
                    callback(value.clone());
                }
            }
            None => tracing::trace!(?kind, "dropping push with no registered callback"),
        }
    }

    /// Performs `HELLO 3` on `conn` if it has not already done so. Memoized
    /// per physical connection rather than per `Engine`, since a pool may
    /// hand out more than one connection and a real RESP3 server gates
    /// non-HELLO commands until the handshake completes on each of them.
    async fn ensure_handshake(&self, conn: &mut PooledConnection<C>) -> EngineResult<()> {
        if conn.hello_done() {
            return Ok(());
        }

        let request = encode_request(b"HELLO", &[b"3"]);
        conn.write_request(&request).await?;
        match conn.read_value().await? {
            Value::Map(_) => {
                conn.mark_hello_done();
                Ok(())
            }
            Value::SimpleError { code, message } => Err(EngineError::Handshake(format!(
                "{} {}",
                String::from_utf8_lossy(&code),
                String::from_utf8_lossy(&message)
            ))),
            other => Err(EngineError::Handshake(format!("unexpected HELLO reply: {other:?}"))),
        }
    }
}
