//! A leased connection: typed frame exchange plus pool-return discipline.

use crate::error::ClientError;
use crate::pool::ConnectionPool;
use mergedb_protocol::{codec, ProtocolError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;

/// One borrowed transport stream.
///
/// Exclusively owned by its holder for the duration of the lease. On drop
/// the stream goes back to its origin pool, unless an earlier exchange
/// errored, in which case the stream is discarded: a connection whose last
/// frame exchange failed must not be reused.
pub struct Connection {
    stream: Option<TcpStream>,
    pool: ConnectionPool,
    healthy: bool,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        pool: ConnectionPool,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            stream: Some(stream),
            pool,
            healthy: true,
            _permit: permit,
        }
    }

    /// Local address of the underlying stream. Identifies this particular
    /// connection even when several lead to the same host.
    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        let stream = self.stream.as_ref().expect("connection present");
        Ok(stream.local_addr()?)
    }

    /// Sends one framed request.
    pub(crate) async fn send<T: Serialize>(
        &mut self,
        msg_code: u8,
        msg: &T,
    ) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().expect("connection present");
        match codec::write_msg(stream, msg_code, msg).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.healthy = false;
                Err(err.into())
            }
        }
    }

    /// Reads one response frame, expecting `success_code`.
    ///
    /// A decoded code-0 error frame leaves the connection healthy (the
    /// frame was consumed whole); transport and protocol-mismatch errors
    /// poison it.
    pub(crate) async fn recv<T: DeserializeOwned>(
        &mut self,
        success_code: u8,
    ) -> Result<T, ClientError> {
        let stream = self.stream.as_mut().expect("connection present");
        match codec::read_msg(stream, success_code).await {
            Ok(msg) => Ok(msg),
            Err(err @ ProtocolError::Server { .. }) => Err(err.into()),
            Err(err) => {
                self.healthy = false;
                Err(err.into())
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if self.healthy {
                self.pool.release(stream);
            } else {
                tracing::debug!(addr = %self.pool.addr(), "discarding connection after failed exchange");
            }
        }
        // The capacity permit is freed when `_permit` drops, after the
        // stream has been parked.
    }
}
