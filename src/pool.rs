// ABOUTME: Bounded pool of RESP3 connections shared by cloned Engine handles
// ABOUTME: Acquire blocks on a semaphore permit; drop discards, only release() reuses

use crate::connection::{Connect, Connection, TcpConnect};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

impl PoolConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, max_connections: 50 }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open connection to {host}:{port}: {source}")]
    Connect { host: String, port: u16, #[source] source: std::io::Error },
}

struct PoolState<C: Connect> {
    idle: Vec<Connection<C::Stream>>,
}

/// A bounded pool of connections to a single host:port.
///
/// Capacity is enforced by a [`tokio::sync::Semaphore`] sized to
/// `max_connections`: `acquire` waits for a permit before either reusing an
/// idle connection or opening a new one. A plain `Notify`-based wait loop
/// was considered and rejected: a waiter's check-then-wait is not atomic
/// with a concurrent wakeup and can miss it. `Semaphore::acquire` has no
/// such gap.
///
/// Cheaply `Clone`: all state lives behind an `Arc`, so cloned handles share
/// one pool, the same way cloned [`crate::client::engine::Engine`] handles
/// do.
pub struct ConnectionPool<C: Connect = TcpConnect> {
    config: Arc<PoolConfig>,
    connector: Arc<C>,
    semaphore: Arc<Semaphore>,
    state: Arc<Mutex<PoolState<C>>>,
}

impl<C: Connect> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            connector: self.connector.clone(),
            semaphore: self.semaphore.clone(),
            state: self.state.clone(),
        }
    }
}

impl ConnectionPool<TcpConnect> {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_connector(config, TcpConnect)
    }
}

impl<C: Connect> ConnectionPool<C> {
    pub fn with_connector(config: PoolConfig, connector: C) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_connections));
        Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            semaphore,
            state: Arc::new(Mutex::new(PoolState { idle: Vec::new() })),
        }
    }

    /// Waits for capacity, then returns either a reused idle connection or a
    /// freshly opened one.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn acquire(&self) -> Result<PooledConnection<C>, PoolError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore is never closed");

        let existing = {
            let mut state = self.state.lock().await;
            state.idle.pop()
        };

        let conn = match existing {
            Some(conn) => conn,
            None => {
                tracing::debug!(host = %self.config.host, port = self.config.port, "opening new connection");
                let stream = self
                    .connector
                    .connect(&self.config.host, self.config.port)
                    .await
                    .map_err(|source| PoolError::Connect {
                        host: self.config.host.clone(),
                        port: self.config.port,
                        source,
                    })?;
                Connection::new(stream)
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            state: self.state.clone(),
            _permit: permit,
        })
    }

    pub fn max_connections(&self) -> usize {
        self.config.max_connections
    }

    pub fn idle_count(&self) -> usize {
        // Best-effort snapshot; callers only use this for tests/diagnostics.
        self.state.try_lock().map(|s| s.idle.len()).unwrap_or(0)
    }
}

/// An owned, checked-out connection. The pool permit and connection both
/// live for the guard's lifetime and are released together.
///
/// Only [`PooledConnection::release`] returns the connection to the idle
/// set. Every other way a guard goes away (an error return that drops it,
/// a cancelled future, a panic unwinding through it, or an explicit
/// [`PooledConnection::discard`]) runs the ordinary `Drop` impl, which
/// frees the permit without re-queuing the connection. This is the
/// "cancellation discards rather than releases" rule from the pool's
/// concurrency contract, implemented without any explicit cancellation
/// handling: ordinary Rust ownership already does it.
pub struct PooledConnection<C: Connect> {
    conn: Option<Connection<C::Stream>>,
    state: Arc<Mutex<PoolState<C>>>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl<C: Connect> PooledConnection<C> {
    /// Returns the connection to the pool's idle set for reuse.
    pub async fn release(mut self) {
        let conn = self.conn.take().expect("connection taken exactly once");
        self.state.lock().await.idle.push(conn);
    }

    /// Explicitly discards the connection instead of reusing it, e.g. after
    /// detecting a protocol error that leaves the stream in an unknown
    /// state. Equivalent to simply dropping the guard.
    pub fn discard(mut self) {
        self.conn.take();
    }
}

impl<C: Connect> std::ops::Deref for PooledConnection<C> {
    type Target = Connection<C::Stream>;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken exactly once")
    }
}

impl<C: Connect> std::ops::DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken exactly once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn echo_server() -> (String, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    loop {
                        use tokio::io::AsyncReadExt;
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => {
                                if socket.write_all(&buf[..n]).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                });
            }
        });
        (addr.ip().to_string(), addr.port())
    }

    #[tokio::test]
    async fn acquire_opens_a_connection_when_idle_set_is_empty() {
        let (host, port) = echo_server().await;
        let pool = ConnectionPool::new(PoolConfig::new(host, port).with_max_connections(2));
        let conn = pool.acquire().await.unwrap();
        conn.release().await;
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn released_connection_is_reused() {
        let (host, port) = echo_server().await;
        let pool = ConnectionPool::new(PoolConfig::new(host, port).with_max_connections(2));
        let first = pool.acquire().await.unwrap();
        first.release().await;
        assert_eq!(pool.idle_count(), 1);
        let _second = pool.acquire().await.unwrap();
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn dropping_a_guard_without_release_discards_it() {
        let (host, port) = echo_server().await;
        let pool = ConnectionPool::new(PoolConfig::new(host, port).with_max_connections(2));
        let conn = pool.acquire().await.unwrap();
        drop(conn);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn acquire_blocks_until_capacity_frees_up() {
        let (host, port) = echo_server().await;
        let pool = ConnectionPool::new(PoolConfig::new(host, port).with_max_connections(1));
        let first = pool.acquire().await.unwrap();

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.acquire().await.unwrap() });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.discard();
        let second = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("acquire should unblock once a permit frees up")
            .unwrap();
        second.discard();
    }
}
