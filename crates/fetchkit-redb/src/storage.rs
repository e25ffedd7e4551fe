//! Redb Storage

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use fetchkit::error::Error as FetchError;
use fetchkit::storage::Storage;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::instrument;

use crate::error::Error;

// <Key, Value>
const ITEMS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("items");
const CONFIG_TABLE: TableDefinition<&str, &str> = TableDefinition::new("config");

const DATABASE_VERSION: u32 = 0;

/// Redb backed key-value [`Storage`]
#[derive(Debug, Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create the database at `path`
    pub fn new(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Parent directory does not exist: {parent:?}"),
                )));
            }
        }

        let db = Arc::new(Database::create(path)?);

        let db_version = {
            let read_txn = db.begin_read()?;
            match read_txn.open_table(CONFIG_TABLE) {
                Ok(table) => table.get("db_version")?.map(|v| v.value().to_string()),
                Err(redb::TableError::TableDoesNotExist(_)) => None,
                Err(e) => return Err(e.into()),
            }
        };

        match db_version {
            Some(stored) => {
                let found = u32::from_str(&stored)?;
                if found != DATABASE_VERSION {
                    return Err(Error::UnsupportedVersion {
                        found,
                        expected: DATABASE_VERSION,
                    });
                }
                tracing::debug!("Opened fetchkit store at schema version {}", found);
            }
            None => {
                let write_txn = db.begin_write()?;
                {
                    let mut table = write_txn.open_table(CONFIG_TABLE)?;
                    table.insert("db_version", DATABASE_VERSION.to_string().as_str())?;
                    // Readers expect the items table to exist
                    let _ = write_txn.open_table(ITEMS_TABLE)?;
                }
                write_txn.commit()?;
                tracing::info!("Created fetchkit store at {}", path.display());
            }
        }

        Ok(Self { db })
    }
}

#[async_trait]
impl Storage for RedbStorage {
    #[instrument(skip(self))]
    async fn get_item(&self, key: &str) -> Result<Option<String>, FetchError> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(ITEMS_TABLE).map_err(Error::from)?;

        let value = table
            .get(key)
            .map_err(Error::from)?
            .map(|value| value.value().to_string());

        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set_item(&self, key: &str, value: &str) -> Result<(), FetchError> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(ITEMS_TABLE).map_err(Error::from)?;
            table.insert(key, value).map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;

        Ok(())
    }
}
