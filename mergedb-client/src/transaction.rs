//! Interactive and static transactions.
//!
//! Both kinds share one read/update contract, expressed by the
//! [`Transaction`] trait. Interactive transactions are registered on the
//! server and pin one connection until commit or abort; static
//! transactions synthesize an implicit start+commit per call on a freshly
//! borrowed connection.

use crate::client::Client;
use crate::connection::Connection;
use crate::error::ClientError;
use mergedb_protocol::{
    code, AbortTransaction, BoundObject, CommitResp, CommitTransaction, OperationResp,
    ReadObjects, ReadObjectsResp, StartTransaction, StaticReadObjects, StaticReadObjectsResp,
    StaticUpdateObjects, UpdateObjects, UpdateOp,
};

/// The capability shared by both transaction kinds.
///
/// One transaction instance serves one caller at a time; share the
/// [`Client`] instead when several tasks need concurrent access.
#[allow(async_fn_in_trait)]
pub trait Transaction {
    /// Applies the given updates.
    async fn update(&mut self, updates: Vec<UpdateOp>) -> Result<(), ClientError>;

    /// Reads the given objects, returning values in request order.
    async fn read(&mut self, objects: Vec<BoundObject>) -> Result<ReadObjectsResp, ClientError>;
}

fn check_success(success: bool, error_code: Option<u32>) -> Result<(), ClientError> {
    if success {
        Ok(())
    } else {
        Err(ClientError::OperationFailed {
            error_code: error_code.unwrap_or(0),
        })
    }
}

/// A transaction handled by the server.
///
/// Updates are visible only to reads in the same transaction until commit.
/// Always commit or abort to clean up the server side and release the
/// pinned connection; an unfinished transaction keeps its connection out
/// of the pool.
pub struct InteractiveTransaction {
    descriptor: Vec<u8>,
    conn: Option<Connection>,
}

impl InteractiveTransaction {
    pub(crate) fn new(descriptor: Vec<u8>, conn: Connection) -> Self {
        Self {
            descriptor,
            conn: Some(conn),
        }
    }

    /// Whether commit or abort has already run.
    pub fn is_finalized(&self) -> bool {
        self.conn.is_none()
    }

    /// Identity of the pinned connection, while the transaction is open.
    /// All reads and updates of this transaction travel over it.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.conn.as_ref().and_then(|c| c.local_addr().ok())
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, ClientError> {
        self.conn.as_mut().ok_or(ClientError::TransactionClosed)
    }

    /// Commits the transaction, making its updates visible to subsequent
    /// transactions.
    ///
    /// Idempotent: a second call is a no-op success with no network round
    /// trip. The pinned connection is released (or discarded, after an
    /// I/O error) on every exit path, including failures.
    pub async fn commit(&mut self) -> Result<(), ClientError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let msg = CommitTransaction {
            transaction_descriptor: self.descriptor.clone(),
        };
        // `conn` drops on every path out of this function, returning the
        // stream to its pool or discarding a poisoned one.
        conn.send(code::COMMIT_TRANSACTION, &msg).await?;
        let resp: CommitResp = conn.recv(code::COMMIT_RESP).await?;
        check_success(resp.success, resp.error_code)
    }

    /// Aborts the transaction, discarding its updates.
    ///
    /// Idempotent, with the same connection-cleanup contract as
    /// [`commit`](Self::commit). A server that does not support abort
    /// answers with an error frame, which is surfaced as-is.
    pub async fn abort(&mut self) -> Result<(), ClientError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let msg = AbortTransaction {
            transaction_descriptor: self.descriptor.clone(),
        };
        conn.send(code::ABORT_TRANSACTION, &msg).await?;
        let resp: OperationResp = conn.recv(code::OPERATION_RESP).await?;
        check_success(resp.success, resp.error_code)
    }
}

impl Transaction for InteractiveTransaction {
    async fn update(&mut self, updates: Vec<UpdateOp>) -> Result<(), ClientError> {
        let msg = UpdateObjects {
            transaction_descriptor: self.descriptor.clone(),
            updates,
        };
        let conn = self.conn_mut()?;
        conn.send(code::UPDATE_OBJECTS, &msg).await?;
        let resp: OperationResp = conn.recv(code::OPERATION_RESP).await?;
        check_success(resp.success, resp.error_code)
    }

    async fn read(&mut self, objects: Vec<BoundObject>) -> Result<ReadObjectsResp, ClientError> {
        let msg = ReadObjects {
            transaction_descriptor: self.descriptor.clone(),
            objects,
        };
        let conn = self.conn_mut()?;
        conn.send(code::READ_OBJECTS, &msg).await?;
        conn.recv(code::READ_OBJECTS_RESP).await
    }
}

/// A pseudo-transaction with no server-side state.
///
/// Each call is self-contained: acquire a fresh connection, send a request
/// with an implicit inline start, decode, release. Calls may be issued
/// concurrently from multiple clones sharing one [`Client`].
pub struct StaticTransaction {
    client: Client,
}

impl StaticTransaction {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Transaction for StaticTransaction {
    async fn update(&mut self, updates: Vec<UpdateOp>) -> Result<(), ClientError> {
        let msg = StaticUpdateObjects {
            transaction: StartTransaction::default(),
            updates,
        };
        let mut conn = self.client.get_connection().await?;
        conn.send(code::STATIC_UPDATE_OBJECTS, &msg).await?;
        // The wire contract answers a static update with a commit-shaped
        // response: one round trip serves both apply and commit.
        let resp: CommitResp = conn.recv(code::COMMIT_RESP).await?;
        check_success(resp.success, resp.error_code)
    }

    async fn read(&mut self, objects: Vec<BoundObject>) -> Result<ReadObjectsResp, ClientError> {
        let msg = StaticReadObjects {
            transaction: StartTransaction::default(),
            objects,
        };
        let mut conn = self.client.get_connection().await?;
        conn.send(code::STATIC_READ_OBJECTS, &msg).await?;
        let resp: StaticReadObjectsResp = conn.recv(code::STATIC_READ_OBJECTS_RESP).await?;
        Ok(resp.objects)
    }
}
