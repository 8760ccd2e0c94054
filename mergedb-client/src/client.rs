//! Client over a set of per-host connection pools.

use crate::connection::Connection;
use crate::error::ClientError;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::transaction::{InteractiveTransaction, StaticTransaction};
use mergedb_protocol::{code, StartTransaction, StartTransactionResp};
use rand::seq::SliceRandom;
use std::sync::Arc;

/// One server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub port: u16,
}

impl Host {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.name, self.port)
    }
}

struct ClientInner {
    pools: Vec<ConnectionPool>,
}

/// Access point to the cluster: one bounded connection pool per host.
///
/// Cheap to clone and safe to share across tasks; every acquired connection
/// is exclusively owned by its caller.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a client with one warm pool per host.
    ///
    /// Fails if `hosts` is empty or any pool cannot dial its host during
    /// warm-up.
    pub async fn new(hosts: Vec<Host>) -> Result<Self, ClientError> {
        if hosts.is_empty() {
            return Err(ClientError::NoHosts);
        }

        let mut pools = Vec::with_capacity(hosts.len());
        for host in &hosts {
            pools.push(ConnectionPool::connect(PoolConfig::new(host.addr())).await?);
        }

        Ok(Self {
            inner: Arc::new(ClientInner { pools }),
        })
    }

    /// Picks a uniformly random permutation of hosts and returns the first
    /// live connection.
    ///
    /// Spreads load across replicas and fails over opportunistically;
    /// repeated calls vary in which host is chosen. Fails with
    /// [`ClientError::AllConnectionsDead`] only when every pool's acquire
    /// attempt errors.
    pub(crate) async fn get_connection(&self) -> Result<Connection, ClientError> {
        let mut order: Vec<usize> = (0..self.inner.pools.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        for i in order {
            let pool = &self.inner.pools[i];
            match pool.acquire().await {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    tracing::debug!(addr = %pool.addr(), %err, "acquire failed, trying next host");
                }
            }
        }
        Err(ClientError::AllConnectionsDead)
    }

    /// Starts a server-tracked interactive transaction.
    ///
    /// The transaction pins the connection it was started on for its whole
    /// lifetime; always finish it with commit or abort to release that
    /// connection.
    pub async fn start_transaction(&self) -> Result<InteractiveTransaction, ClientError> {
        let mut conn = self.get_connection().await?;
        conn.send(code::START_TRANSACTION, &StartTransaction::default())
            .await?;
        let resp: StartTransactionResp = conn.recv(code::START_TRANSACTION_RESP).await?;
        tracing::debug!("interactive transaction started");
        Ok(InteractiveTransaction::new(resp.transaction_descriptor, conn))
    }

    /// Creates a static transaction. No I/O happens until its first call;
    /// every call borrows a fresh pooled connection.
    pub fn create_static_transaction(&self) -> StaticTransaction {
        StaticTransaction::new(self.clone())
    }

    /// Closes every pool. Subsequent operations fail deterministically.
    pub fn close(&self) {
        for pool in &self.inner.pools {
            pool.close();
        }
    }
}
