//! # mergedb-client
//!
//! Client library for mergedb.
//!
//! This crate provides:
//! - A connection-pool-backed [`Client`] with randomized host selection
//! - Interactive (server-tracked) and static (one-shot) transactions
//! - Typed CRDT update builders and read accessors, including recursively
//!   nested maps
//!
//! ```no_run
//! use mergedb_client::{counter_inc, Bucket, Client, Host};
//!
//! # async fn demo() -> Result<(), mergedb_client::ClientError> {
//! let client = Client::new(vec![Host::new("127.0.0.1", 8087)]).await?;
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

pub mod client;
pub mod connection;
pub mod crdt;
pub mod error;
pub mod pool;
pub mod transaction;

pub use client::{Client, Host};
pub use connection::Connection;
pub use crdt::{
    counter_inc, map_update, mvreg_put, reg_put, set_add, set_remove, Bucket, CrdtUpdate,
    MapEntryKey, MapReadResult,
};
pub use error::ClientError;
pub use pool::{ConnectionPool, PoolConfig, INITIAL_POOL_SIZE, MAX_POOL_SIZE};
pub use transaction::{InteractiveTransaction, StaticTransaction, Transaction};
