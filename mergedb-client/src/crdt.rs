//! CRDT addressing, update builders, and decoded map results.
//!
//! Merge and conflict resolution happen server-side; this module only
//! builds typed operations and unwraps typed values.

use crate::error::ClientError;
use crate::transaction::Transaction;
use mergedb_protocol::{
    BoundObject, CounterUpdate, CrdtType, CrdtValue, MapEntry, MapKey, MapNestedUpdate,
    MapUpdateOp, RegUpdate, SetOpKind, SetUpdate, UpdateOp, UpdateOperation,
};

/// Namespace for keyed objects. A value type: creating one costs no server
/// round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    name: Vec<u8>,
}

impl Bucket {
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    fn object(&self, key: &[u8], crdt_type: CrdtType) -> BoundObject {
        BoundObject {
            bucket: self.name.clone(),
            key: key.to_vec(),
            crdt_type,
        }
    }

    /// Applies updates to this bucket in the context of `tx`, converting
    /// each to its bucket-qualified top-level form.
    pub async fn update<T: Transaction>(
        &self,
        tx: &mut T,
        updates: Vec<CrdtUpdate>,
    ) -> Result<(), ClientError> {
        let ops = updates
            .into_iter()
            .map(|u| u.into_toplevel(&self.name))
            .collect();
        tx.update(ops).await
    }

    async fn read_one<T: Transaction>(
        &self,
        tx: &mut T,
        key: &[u8],
        crdt_type: CrdtType,
    ) -> Result<CrdtValue, ClientError> {
        let resp = tx.read(vec![self.object(key, crdt_type)]).await?;
        resp.objects
            .into_iter()
            .next()
            .ok_or(ClientError::UnexpectedValue {
                expected: crdt_type,
            })
    }

    /// Reads the value of the counter under `key`.
    pub async fn read_counter<T: Transaction>(
        &self,
        tx: &mut T,
        key: impl AsRef<[u8]>,
    ) -> Result<i64, ClientError> {
        match self.read_one(tx, key.as_ref(), CrdtType::Counter).await? {
            CrdtValue::Counter { value } => Ok(value),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::Counter,
            }),
        }
    }

    /// Reads the elements of the add-wins set under `key`.
    pub async fn read_set<T: Transaction>(
        &self,
        tx: &mut T,
        key: impl AsRef<[u8]>,
    ) -> Result<Vec<Vec<u8>>, ClientError> {
        match self.read_one(tx, key.as_ref(), CrdtType::OrSet).await? {
            CrdtValue::Set { values } => Ok(values),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::OrSet,
            }),
        }
    }

    /// Reads the value of the last-writer-wins register under `key`.
    pub async fn read_reg<T: Transaction>(
        &self,
        tx: &mut T,
        key: impl AsRef<[u8]>,
    ) -> Result<Vec<u8>, ClientError> {
        match self.read_one(tx, key.as_ref(), CrdtType::LwwReg).await? {
            CrdtValue::Reg { value } => Ok(value),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::LwwReg,
            }),
        }
    }

    /// Reads the concurrent values of the multi-value register under `key`.
    pub async fn read_mvreg<T: Transaction>(
        &self,
        tx: &mut T,
        key: impl AsRef<[u8]>,
    ) -> Result<Vec<Vec<u8>>, ClientError> {
        match self.read_one(tx, key.as_ref(), CrdtType::MvReg).await? {
            CrdtValue::MvReg { values } => Ok(values),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::MvReg,
            }),
        }
    }

    /// Reads the map under `key`.
    pub async fn read_map<T: Transaction>(
        &self,
        tx: &mut T,
        key: impl AsRef<[u8]>,
    ) -> Result<MapReadResult, ClientError> {
        match self.read_one(tx, key.as_ref(), CrdtType::RrMap).await? {
            CrdtValue::Map { entries } => Ok(MapReadResult::new(entries)),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::RrMap,
            }),
        }
    }
}

/// One typed mutation against a key.
///
/// Convertible to a bucket-qualified top-level operation or to the nested
/// form used inside map updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdtUpdate {
    pub key: Vec<u8>,
    pub crdt_type: CrdtType,
    pub operation: UpdateOperation,
}

impl CrdtUpdate {
    /// Converts to a top-level operation addressed through `bucket`.
    pub fn into_toplevel(self, bucket: &[u8]) -> UpdateOp {
        UpdateOp {
            object: BoundObject {
                bucket: bucket.to_vec(),
                key: self.key,
                crdt_type: self.crdt_type,
            },
            operation: self.operation,
        }
    }

    /// Converts to the nested form, keyed by map-entry key and type with
    /// no bucket.
    pub fn into_nested(self) -> MapNestedUpdate {
        MapNestedUpdate {
            key: MapKey {
                key: self.key,
                crdt_type: self.crdt_type,
            },
            update: self.operation,
        }
    }
}

/// Increments the counter under `key` by `inc`.
pub fn counter_inc(key: impl Into<Vec<u8>>, inc: i64) -> CrdtUpdate {
    CrdtUpdate {
        key: key.into(),
        crdt_type: CrdtType::Counter,
        operation: UpdateOperation::Counter(CounterUpdate { inc }),
    }
}

/// Adds elements to the add-wins set under `key`.
pub fn set_add(key: impl Into<Vec<u8>>, elements: Vec<Vec<u8>>) -> CrdtUpdate {
    CrdtUpdate {
        key: key.into(),
        crdt_type: CrdtType::OrSet,
        operation: UpdateOperation::Set(SetUpdate {
            op: SetOpKind::Add,
            elements,
        }),
    }
}

/// Removes elements from the add-wins set under `key`.
pub fn set_remove(key: impl Into<Vec<u8>>, elements: Vec<Vec<u8>>) -> CrdtUpdate {
    CrdtUpdate {
        key: key.into(),
        crdt_type: CrdtType::OrSet,
        operation: UpdateOperation::Set(SetUpdate {
            op: SetOpKind::Remove,
            elements,
        }),
    }
}

/// Writes a value into the last-writer-wins register under `key`.
pub fn reg_put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> CrdtUpdate {
    CrdtUpdate {
        key: key.into(),
        crdt_type: CrdtType::LwwReg,
        operation: UpdateOperation::Reg(RegUpdate {
            value: value.into(),
        }),
    }
}

/// Writes a value into the multi-value register under `key`.
pub fn mvreg_put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> CrdtUpdate {
    CrdtUpdate {
        key: key.into(),
        crdt_type: CrdtType::MvReg,
        operation: UpdateOperation::Reg(RegUpdate {
            value: value.into(),
        }),
    }
}

/// Updates entries nested inside the map under `key`. Child updates are
/// converted to the nested representation recursively.
pub fn map_update(key: impl Into<Vec<u8>>, updates: Vec<CrdtUpdate>) -> CrdtUpdate {
    let nested = updates.into_iter().map(CrdtUpdate::into_nested).collect();
    CrdtUpdate {
        key: key.into(),
        crdt_type: CrdtType::RrMap,
        operation: UpdateOperation::Map(MapUpdateOp { updates: nested }),
    }
}

/// Key and type of one embedded CRDT, as listed by
/// [`MapReadResult::list_map_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntryKey {
    pub key: Vec<u8>,
    pub crdt_type: CrdtType,
}

/// Decoded value of a recursively-typed map.
///
/// Entries are identified by the (type, key) pair: a map may hold CRDTs of
/// different types under the same key bytes, and lookups match on both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapReadResult {
    entries: Vec<MapEntry>,
}

impl MapReadResult {
    pub fn new(entries: Vec<MapEntry>) -> Self {
        Self { entries }
    }

    fn find(&self, crdt_type: CrdtType, key: &[u8]) -> Result<&CrdtValue, ClientError> {
        self.entries
            .iter()
            .find(|e| e.key.crdt_type == crdt_type && e.key.key == key)
            .map(|e| &e.value)
            .ok_or_else(|| ClientError::EntryNotFound {
                key: key.to_vec(),
                crdt_type,
            })
    }

    /// Value of the nested counter under `key`.
    pub fn counter(&self, key: impl AsRef<[u8]>) -> Result<i64, ClientError> {
        match self.find(CrdtType::Counter, key.as_ref())? {
            CrdtValue::Counter { value } => Ok(*value),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::Counter,
            }),
        }
    }

    /// Elements of the nested add-wins set under `key`.
    pub fn set(&self, key: impl AsRef<[u8]>) -> Result<Vec<Vec<u8>>, ClientError> {
        match self.find(CrdtType::OrSet, key.as_ref())? {
            CrdtValue::Set { values } => Ok(values.clone()),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::OrSet,
            }),
        }
    }

    /// Value of the nested last-writer-wins register under `key`.
    pub fn reg(&self, key: impl AsRef<[u8]>) -> Result<Vec<u8>, ClientError> {
        match self.find(CrdtType::LwwReg, key.as_ref())? {
            CrdtValue::Reg { value } => Ok(value.clone()),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::LwwReg,
            }),
        }
    }

    /// Concurrent values of the nested multi-value register under `key`.
    pub fn mvreg(&self, key: impl AsRef<[u8]>) -> Result<Vec<Vec<u8>>, ClientError> {
        match self.find(CrdtType::MvReg, key.as_ref())? {
            CrdtValue::MvReg { values } => Ok(values.clone()),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::MvReg,
            }),
        }
    }

    /// Nested map under `key`, scoped to that entry's children.
    pub fn map(&self, key: impl AsRef<[u8]>) -> Result<MapReadResult, ClientError> {
        match self.find(CrdtType::RrMap, key.as_ref())? {
            CrdtValue::Map { entries } => Ok(MapReadResult::new(entries.clone())),
            _ => Err(ClientError::UnexpectedValue {
                expected: CrdtType::RrMap,
            }),
        }
    }

    /// Keys and types of all entries, in decoded order.
    pub fn list_map_keys(&self) -> Vec<MapEntryKey> {
        self.entries
            .iter()
            .map(|e| MapEntryKey {
                key: e.key.key.clone(),
                crdt_type: e.key.crdt_type,
            })
            .collect()
    }
}
