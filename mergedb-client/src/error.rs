//! Client error types.

use mergedb_protocol::{CrdtType, ProtocolError};
use thiserror::Error;

/// Client errors.
///
/// None of these are retried internally; callers decide whether and when
/// to retry at a higher level.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to dial or configure a TCP stream.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Transport, framing, or server-reported failure from one exchange.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Every pool's acquire attempt errored during one host scan.
    #[error("all connections dead")]
    AllConnectionsDead,

    /// The pool was closed; no further connections will be lent out.
    #[error("pool is closed")]
    PoolClosed,

    /// A client needs at least one host.
    #[error("no hosts configured")]
    NoHosts,

    /// A well-formed operation or commit response carried a false success
    /// flag. Softer than a code-0 error frame.
    #[error("operation not successful; error code {error_code}")]
    OperationFailed { error_code: u32 },

    /// Read or update issued on an already finalized transaction. Caught
    /// locally, before any I/O.
    #[error("transaction already committed or aborted")]
    TransactionClosed,

    /// No entry with this (type, key) pair in a decoded map result.
    #[error("{crdt_type} entry with key '{}' not found", String::from_utf8_lossy(key))]
    EntryNotFound { key: Vec<u8>, crdt_type: CrdtType },

    /// A read response held no value, or a value of the wrong shape, for
    /// the requested type tag.
    #[error("read response did not carry a {expected} value")]
    UnexpectedValue { expected: CrdtType },
}
