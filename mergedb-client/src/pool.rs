//! Bounded per-host connection pool.
//!
//! Each pool owns the TCP streams for one host. Acquiring lends out an
//! exclusively-owned [`Connection`]; dropping the connection returns the
//! stream to its origin pool, or discards it if the last exchange on it
//! errored. Streams never move between pools.

use crate::connection::Connection;
use crate::error::ClientError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;

/// Number of connections dialed eagerly when a pool is created.
pub const INITIAL_POOL_SIZE: usize = 1;

/// Hard cap on concurrent connections per host.
pub const MAX_POOL_SIZE: usize = 50;

/// Pool configuration for one host.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Host address, e.g. "127.0.0.1:8087".
    pub addr: String,
    /// Warm connections dialed at creation.
    pub initial_size: usize,
    /// Maximum concurrent connections.
    pub max_size: usize,
}

impl PoolConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            initial_size: INITIAL_POOL_SIZE,
            max_size: MAX_POOL_SIZE,
        }
    }
}

struct PoolState {
    idle: VecDeque<TcpStream>,
    closed: bool,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    permits: Arc<Semaphore>,
}

/// Bounded pool of TCP streams to one host. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates the pool and dials its warm connections.
    ///
    /// Fails if any warm dial fails, so a freshly constructed pool is known
    /// to have reached its host at least once.
    pub async fn connect(config: PoolConfig) -> Result<Self, ClientError> {
        let pool = Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.max_size)),
                state: Mutex::new(PoolState {
                    idle: VecDeque::with_capacity(config.initial_size),
                    closed: false,
                }),
                config,
            }),
        };

        for _ in 0..pool.inner.config.initial_size {
            let stream = pool.dial().await?;
            pool.inner.state.lock().idle.push_back(stream);
        }

        tracing::debug!(addr = %pool.inner.config.addr, "pool ready");
        Ok(pool)
    }

    async fn dial(&self) -> Result<TcpStream, ClientError> {
        let stream = TcpStream::connect(&self.inner.config.addr).await?;
        // Nagle off: frames are small and latency-sensitive.
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Acquires a connection.
    ///
    /// Prefers an idle stream; dials a new one if the pool has spare
    /// capacity. Waits when the pool is at its cap with nothing idle.
    pub async fn acquire(&self) -> Result<Connection, ClientError> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClientError::PoolClosed)?;

        let idle = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(ClientError::PoolClosed);
            }
            state.idle.pop_front()
        };

        let stream = match idle {
            Some(stream) => stream,
            // Permit is dropped on the error path, freeing the slot.
            None => self.dial().await?,
        };

        tracing::debug!(addr = %self.inner.config.addr, "connection acquired");
        Ok(Connection::new(stream, self.clone(), permit))
    }

    /// Returns a healthy stream to the idle queue. Streams returned after
    /// close are dropped.
    pub(crate) fn release(&self, stream: TcpStream) {
        let mut state = self.inner.state.lock();
        if !state.closed {
            state.idle.push_back(stream);
        }
    }

    /// Closes the pool: drops idle streams and fails pending and future
    /// acquires deterministically.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.idle.clear();
        }
        self.inner.permits.close();
        tracing::debug!(addr = %self.inner.config.addr, "pool closed");
    }

    /// Address this pool dials.
    pub fn addr(&self) -> &str {
        &self.inner.config.addr
    }

    /// Number of idle streams currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }
}
