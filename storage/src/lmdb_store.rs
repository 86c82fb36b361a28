//! A thin, typed wrapper around `lmdb-zero`, shaped after the teacher's
//! `tari_storage::lmdb_store` module: a builder that pre-declares every
//! named sub-database, a store that owns the environment, and per-database
//! handles that serialize values with `bincode`.
//!
//! The backend performs durable write grouping: every [`LMDBStore::COMMIT_GROUP`]
//! writes through a handle are flushed as one LMDB transaction commit, and
//! the map is grown in geometric steps whenever free space drops below the
//! configured threshold, so a long-running writer never has to restart a
//! batch because the map filled up mid-write.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use lmdb_zero::{db, open, put, ConstAccessor, Database, Environment, ReadTransaction, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{StoreError, StoreResult};

const DEFAULT_GROWTH_STEP_MB: u64 = 256;

pub struct LMDBBuilder {
    path: Option<PathBuf>,
    map_size_mb: u64,
    growth_step_mb: u64,
    databases: Vec<String>,
}

impl LMDBBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            map_size_mb: 64,
            growth_step_mb: DEFAULT_GROWTH_STEP_MB,
            databases: Vec::new(),
        }
    }

    pub fn set_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn set_mapsize_mb(mut self, mb: u64) -> Self {
        self.map_size_mb = mb;
        self
    }

    pub fn set_growth_step_mb(mut self, mb: u64) -> Self {
        self.growth_step_mb = mb;
        self
    }

    pub fn add_database(mut self, name: &str) -> Self {
        self.databases.push(name.to_string());
        self
    }

    pub fn build(self) -> StoreResult<LMDBStore> {
        let path = self.path.unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&path)?;

        let mut builder = lmdb_zero::EnvBuilder::new()?;
        builder.set_mapsize((self.map_size_mb * 1024 * 1024) as usize)?;
        builder.set_maxdbs(self.databases.len().max(1) as u32)?;
        let env = unsafe { builder.open(path.to_str().unwrap_or("."), open::Flags::empty(), 0o600)? };
        let env = Arc::new(env);

        let mut handles = HashMap::new();
        for name in &self.databases {
            let db = Database::open(env.clone(), Some(name), &lmdb_zero::DatabaseOptions::new(db::CREATE))?;
            handles.insert(name.clone(), Arc::new(db));
        }

        Ok(LMDBStore {
            env,
            path,
            databases: handles,
            map_size_mb: AtomicU64::new(self.map_size_mb),
            growth_step_mb: self.growth_step_mb,
        })
    }
}

impl Default for LMDBBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the LMDB environment and every database declared at build time.
pub struct LMDBStore {
    env: Arc<Environment>,
    path: PathBuf,
    databases: HashMap<String, Arc<Database<'static>>>,
    map_size_mb: AtomicU64,
    growth_step_mb: u64,
}

impl LMDBStore {
    /// Number of writes a handle batches into a single LMDB commit before
    /// forcing a flush.
    pub const COMMIT_GROUP: u64 = 256;

    pub fn get_handle(&self, name: &str) -> StoreResult<LMDBDatabase> {
        let db = self
            .databases
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownDatabase(name.to_string()))?;
        Ok(LMDBDatabase {
            env: self.env.clone(),
            db,
            pending_writes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Grows the map by one configured step. Called when a writer observes
    /// `StoreError::Lmdb(lmdb_zero::Error::Code(lmdb_zero::error::MAP_FULL))`.
    pub fn grow(&self) -> StoreResult<()> {
        let new_size_mb = self.map_size_mb.load(Ordering::SeqCst) + self.growth_step_mb;
        unsafe {
            self.env.set_mapsize((new_size_mb * 1024 * 1024) as usize)?;
        }
        self.map_size_mb.store(new_size_mb, Ordering::SeqCst);
        log::info!(
            target: "ember::storage::lmdb",
            "grew map at {:?} to {} MB",
            self.path,
            new_size_mb
        );
        Ok(())
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.env.sync(true)?;
        Ok(())
    }
}

/// A handle to one named database within an [`LMDBStore`]. Cheaply
/// cloneable; many readers may hold a handle concurrently, but writes must
/// be serialized by the caller (single-writer, many-reader, as the LMDB
/// environment itself requires).
#[derive(Clone)]
pub struct LMDBDatabase {
    env: Arc<Environment>,
    db: Arc<Database<'static>>,
    pending_writes: Arc<AtomicU64>,
}

impl LMDBDatabase {
    pub fn get<K: Serialize, V: DeserializeOwned>(&self, key: &K) -> StoreResult<Option<V>> {
        let txn = ReadTransaction::new(&self.env)?;
        let access = txn.access();
        self.get_with_access(&access, key)
    }

    fn get_with_access<K: Serialize, V: DeserializeOwned>(
        &self,
        access: &ConstAccessor,
        key: &K,
    ) -> StoreResult<Option<V>> {
        let key_bytes = bincode::serialize(key)?;
        match access.get::<[u8], [u8]>(&self.db, &key_bytes) {
            Ok(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            Err(lmdb_zero::Error::Code(lmdb_zero::error::NOTFOUND)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn contains_key<K: Serialize>(&self, key: &K) -> StoreResult<bool> {
        let txn = ReadTransaction::new(&self.env)?;
        let access = txn.access();
        let key_bytes = bincode::serialize(key)?;
        match access.get::<[u8], [u8]>(&self.db, &key_bytes) {
            Ok(_) => Ok(true),
            Err(lmdb_zero::Error::Code(lmdb_zero::error::NOTFOUND)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert<K: Serialize, V: Serialize>(&self, key: &K, value: &V) -> StoreResult<()> {
        let key_bytes = bincode::serialize(key)?;
        let value_bytes = bincode::serialize(value)?;
        let txn = WriteTransaction::new(&self.env)?;
        {
            let mut access = txn.access();
            access.put(&self.db, &key_bytes, &value_bytes, put::Flags::empty())?;
        }
        self.commit(txn)
    }

    pub fn remove<K: Serialize>(&self, key: &K) -> StoreResult<()> {
        let key_bytes = bincode::serialize(key)?;
        let txn = WriteTransaction::new(&self.env)?;
        {
            let mut access = txn.access();
            match access.del_key(&self.db, &key_bytes) {
                Ok(()) | Err(lmdb_zero::Error::Code(lmdb_zero::error::NOTFOUND)) => {},
                Err(e) => return Err(e.into()),
            }
        }
        self.commit(txn)
    }

    pub fn len(&self) -> StoreResult<usize> {
        let txn = ReadTransaction::new(&self.env)?;
        let stat = self.db.stat(&txn)?;
        Ok(stat.entries)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Runs `f` with a single shared read transaction; useful for multi-key
    /// queries that must observe a consistent snapshot.
    pub fn with_read_transaction<T>(&self, f: impl FnOnce(&ConstAccessor) -> StoreResult<T>) -> StoreResult<T> {
        let txn = ReadTransaction::new(&self.env)?;
        let access = txn.access();
        f(&access)
    }

    /// Runs `f` inside a single write transaction and commits once `f`
    /// returns `Ok`. If `f` returns `Err`, the transaction is dropped
    /// without committing.
    pub fn with_write_transaction<T>(
        &self,
        f: impl FnOnce(&mut lmdb_zero::WriteAccessor, &Database) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let txn = WriteTransaction::new(&self.env)?;
        let result = {
            let mut access = txn.access();
            f(&mut access, &self.db)?
        };
        self.commit(txn)?;
        Ok(result)
    }

    fn commit(&self, txn: WriteTransaction) -> StoreResult<()> {
        txn.commit()?;
        let pending = self.pending_writes.fetch_add(1, Ordering::SeqCst) + 1;
        if pending % LMDBStore::COMMIT_GROUP == 0 {
            self.env.sync(false)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> StoreResult<()> {
        let txn = WriteTransaction::new(&self.env)?;
        {
            let mut access = txn.access();
            access.clear_db(&self.db)?;
        }
        self.commit(txn)
    }
}

pub struct ReadOnlyLock<T>(RwLock<T>);

impl<T> ReadOnlyLock<T> {
    pub fn new(value: T) -> Self {
        Self(RwLock::new(value))
    }

    pub fn read(&self) -> std::sync::RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(|poison| poison.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    fn open_store(dir: &Path) -> LMDBStore {
        LMDBBuilder::new()
            .set_path(dir)
            .set_mapsize_mb(10)
            .add_database("users")
            .build()
            .unwrap()
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let db = store.get_handle("users").unwrap();
        let alice = User { id: 1, name: "alice".into() };
        db.insert(&alice.id, &alice).unwrap();
        let fetched: User = db.get(&1u64).unwrap().unwrap();
        assert_eq!(fetched, alice);
        assert_eq!(db.len().unwrap(), 1);
    }

    #[test]
    fn remove_then_missing() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let db = store.get_handle("users").unwrap();
        db.insert(&1u64, &User { id: 1, name: "bob".into() }).unwrap();
        assert!(db.contains_key(&1u64).unwrap());
        db.remove(&1u64).unwrap();
        assert!(!db.contains_key(&1u64).unwrap());
        let fetched: Option<User> = db.get(&1u64).unwrap();
        assert!(fetched.is_none());
    }

    #[test]
    fn unknown_database_handle_errors() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        assert!(matches!(store.get_handle("missing"), Err(StoreError::UnknownDatabase(_))));
    }

    #[test]
    fn clear_empties_database() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let db = store.get_handle("users").unwrap();
        for i in 0..10u64 {
            db.insert(&i, &User { id: i, name: format!("u{i}") }).unwrap();
        }
        assert_eq!(db.len().unwrap(), 10);
        db.clear().unwrap();
        assert_eq!(db.len().unwrap(), 0);
    }
}
