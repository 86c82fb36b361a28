//! Key-value store primitives shared by every Ember storage backend.

pub mod error;
pub mod lmdb_store;

pub use error::{StoreError, StoreResult};
pub use lmdb_store::{LMDBBuilder, LMDBDatabase, LMDBStore};
