//! Errors raised by the redb store

use std::num::ParseIntError;

use thiserror::Error;

/// Redb store error
#[derive(Debug, Error)]
pub enum Error {
    /// Generic redb failure
    #[error(transparent)]
    Redb(#[from] redb::Error),
    /// Opening or creating the database file failed
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),
    /// Could not begin a transaction
    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),
    /// Could not commit a write
    #[error(transparent)]
    Commit(#[from] redb::CommitError),
    /// Could not open a table
    #[error(transparent)]
    Table(#[from] redb::TableError),
    /// Read or write inside a table failed
    #[error(transparent)]
    Storage(#[from] redb::StorageError),
    /// Filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Stored schema version is not a number
    #[error("Corrupt schema version: {0}")]
    ParseInt(#[from] ParseIntError),
    /// File was written with a schema this build does not understand
    #[error("Unsupported schema version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version stored in the file
        found: u32,
        /// Version this build writes
        expected: u32,
    },
}

impl From<Error> for fetchkit::error::Error {
    fn from(e: Error) -> Self {
        Self::storage(e)
    }
}
