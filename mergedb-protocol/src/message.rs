//! Typed request and response payloads.
//!
//! These mirror the server's versioned payload schema. Each struct is
//! serialized into the payload of one frame; the message code on the frame
//! identifies which payload type to expect (see [`crate::frame::code`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRDT type tags.
///
/// A bound object's tag must match the type with which the key was last
/// written; mismatches are reported by the server, not detected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrdtType {
    /// Operation-based counter.
    Counter,
    /// Add-wins observed-remove set.
    OrSet,
    /// Last-writer-wins register.
    LwwReg,
    /// Multi-value register.
    MvReg,
    /// Recursively-nested add-wins map.
    RrMap,
}

impl fmt::Display for CrdtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrdtType::Counter => write!(f, "COUNTER"),
            CrdtType::OrSet => write!(f, "OR_SET"),
            CrdtType::LwwReg => write!(f, "LWW_REG"),
            CrdtType::MvReg => write!(f, "MV_REG"),
            CrdtType::RrMap => write!(f, "RR_MAP"),
        }
    }
}

/// Transaction properties carried in start messages.
///
/// Defaults match what the server treats as an ordinary read-write
/// transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnProperties {
    pub read_write: u32,
    pub red_blue: u32,
}

/// Start transaction request (code 119).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartTransaction {
    pub properties: TxnProperties,
}

/// Start transaction response (code 124).
///
/// The descriptor is opaque: it is issued and consumed only by the server
/// that produced it and must never be replayed against another host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTransactionResp {
    pub transaction_descriptor: Vec<u8>,
}

/// Address triple of one CRDT instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundObject {
    pub bucket: Vec<u8>,
    pub key: Vec<u8>,
    pub crdt_type: CrdtType,
}

/// Key and type of one map entry. Entries are identified by the pair, not
/// the key alone: a map may hold CRDTs of different types under the same
/// key bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapKey {
    pub key: Vec<u8>,
    pub crdt_type: CrdtType,
}

/// Whether a set update adds or removes its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetOpKind {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub inc: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUpdate {
    pub op: SetOpKind,
    pub elements: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegUpdate {
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapUpdateOp {
    pub updates: Vec<MapNestedUpdate>,
}

/// One typed mutation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperation {
    Counter(CounterUpdate),
    Set(SetUpdate),
    Reg(RegUpdate),
    Map(MapUpdateOp),
}

/// A mutation against one top-level, bucket-qualified object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOp {
    pub object: BoundObject,
    pub operation: UpdateOperation,
}

/// A mutation against one entry nested inside a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapNestedUpdate {
    pub key: MapKey,
    pub update: UpdateOperation,
}

/// Read objects request (code 116).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadObjects {
    pub transaction_descriptor: Vec<u8>,
    pub objects: Vec<BoundObject>,
}

/// Decoded value of one CRDT instance.
///
/// Map values recurse: each entry holds a further `CrdtValue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrdtValue {
    Counter { value: i64 },
    Set { values: Vec<Vec<u8>> },
    Reg { value: Vec<u8> },
    MvReg { values: Vec<Vec<u8>> },
    Map { entries: Vec<MapEntry> },
}

/// One entry of a decoded map value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: MapKey,
    pub value: CrdtValue,
}

/// Read objects response (code 126), values in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadObjectsResp {
    pub objects: Vec<CrdtValue>,
}

/// Update objects request (code 118).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateObjects {
    pub transaction_descriptor: Vec<u8>,
    pub updates: Vec<UpdateOp>,
}

/// Operation response (code 111), shared by update and abort.
///
/// `success == false` is a soft failure inside a well-formed response,
/// distinct from a code-0 error frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResp {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
}

/// Commit transaction request (code 121).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTransaction {
    pub transaction_descriptor: Vec<u8>,
}

/// Abort transaction request (code 120).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortTransaction {
    pub transaction_descriptor: Vec<u8>,
}

/// Commit response (code 127), also the response shape of static updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResp {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_time: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
}

/// Static update objects request (code 122).
///
/// Embeds a fresh start-transaction marker inline; there is no separate
/// start round-trip, and the response is commit-shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticUpdateObjects {
    pub transaction: StartTransaction,
    pub updates: Vec<UpdateOp>,
}

/// Static read objects request (code 123).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticReadObjects {
    pub transaction: StartTransaction,
    pub objects: Vec<BoundObject>,
}

/// Static read objects response (code 128).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticReadObjectsResp {
    pub objects: ReadObjectsResp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_time: Option<Vec<u8>>,
}

/// Error response payload (code 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResp {
    pub error_code: u32,
    pub error_message: Vec<u8>,
}
