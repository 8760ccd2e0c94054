//! # mergedb
//!
//! Client for the mergedb CRDT-based transactional data store.
//!
//! This crate re-exports the two building blocks:
//! - [`client`](mergedb_client): connection pooling, transactions, and the
//!   typed CRDT API. Start here.
//! - [`protocol`](mergedb_protocol): the framed wire protocol, useful for
//!   building custom tooling or test servers.
//!
//! ```no_run
//! use mergedb::{counter_inc, Bucket, Client, Host};
//!
//! # async fn demo() -> Result<(), mergedb::ClientError> {
//! let client = Client::new(vec![Host::new("127.0.0.1", mergedb::DEFAULT_PORT)]).await?;
//! let bucket = Bucket::new("stats");
//!
//! let mut tx = client.start_transaction().await?;
//! bucket.update(&mut tx, vec![counter_inc("visits", 1)]).await?;
//! let visits = bucket.read_counter(&mut tx, "visits").await?;
//! tx.commit().await?;
//! # let _ = visits;
//! # Ok(())
//! # }
//! ```

pub use mergedb_client as client;
pub use mergedb_protocol as protocol;

pub use mergedb_client::{
    counter_inc, map_update, mvreg_put, reg_put, set_add, set_remove, Bucket, Client, ClientError,
    CrdtUpdate, Host, InteractiveTransaction, MapEntryKey, MapReadResult, StaticTransaction,
    Transaction,
};
pub use mergedb_protocol::{CrdtType, CrdtValue, ProtocolError, DEFAULT_PORT};
