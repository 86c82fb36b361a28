use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("LMDB error: {0}")]
    Lmdb(#[from] lmdb_zero::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("Database handle '{0}' was not registered with the builder")]
    UnknownDatabase(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Map size exceeded and automatic growth is disabled")]
    MapFull,
}

pub type StoreResult<T> = Result<T, StoreError>;
