//! # mergedb-protocol
//!
//! Wire protocol implementation for mergedb.
//!
//! This crate provides:
//! - Binary framing with a big-endian length prefix and a message-code byte
//! - The fixed message-code registry shared with the server
//! - Typed request/response payloads and CRDT value types
//! - Protocol error types, including decoded server error frames

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{decode_frame, read_frame, read_msg, write_msg};
pub use error::ProtocolError;
pub use frame::{code, Frame, LENGTH_PREFIX_SIZE};
pub use message::{
    AbortTransaction, BoundObject, CommitResp, CommitTransaction, CounterUpdate, CrdtType,
    CrdtValue, ErrorResp,
    MapEntry, MapKey, MapNestedUpdate, MapUpdateOp, OperationResp, ReadObjects, ReadObjectsResp,
    RegUpdate, SetOpKind, SetUpdate, StartTransaction, StartTransactionResp, StaticReadObjects,
    StaticReadObjectsResp, StaticUpdateObjects, TxnProperties, UpdateObjects, UpdateOp,
    UpdateOperation,
};

/// Default port for mergedb servers.
pub const DEFAULT_PORT: u16 = 8087;

/// Maximum frame payload size (16 MiB), excluding the message-code byte.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
