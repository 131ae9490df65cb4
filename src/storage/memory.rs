//! In-memory storage backend
//!
//! Tables are plain maps behind per-table reader–writer locks, so a
//! transaction on one table never blocks reads from another. Transactions
//! stage their writes and merge them only when the closure succeeds, so a
//! failed apply leaves the table untouched.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, StorageError};
use crate::storage::{Storage, Transaction};

#[derive(Default)]
struct MemTable {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

/// Volatile [`Storage`] implementation.
#[derive(Default)]
pub struct MemStorage {
    tables: RwLock<HashMap<String, Arc<MemTable>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: &str) -> Option<Arc<MemTable>> {
        self.tables.read().get(table).cloned()
    }

    fn table_or_create(&self, table: &str) -> Arc<MemTable> {
        if let Some(t) = self.table(table) {
            return t;
        }
        Arc::clone(
            self.tables
                .write()
                .entry(table.to_string())
                .or_default(),
        )
    }
}

/// Staged writes: `Some` for puts, `None` for deletes.
#[derive(Default)]
struct MemTx {
    changes: HashMap<String, Option<Vec<u8>>>,
}

impl Transaction for MemTx {
    fn put(&mut self, key: &str, size: u64, r: &mut dyn Read) -> Result<(), StorageError> {
        let mut data = Vec::new();
        r.take(size).read_to_end(&mut data)?;
        self.changes.insert(key.to_string(), Some(data));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.changes.insert(key.to_string(), None);
        Ok(())
    }
}

impl Storage for MemStorage {
    fn open_at(
        &self,
        table: &str,
        key: &str,
        offset: u64,
    ) -> Result<Box<dyn Read + Send>, StorageError> {
        let tab = self.table(table).ok_or(StorageError::NotFound)?;
        let data = tab.data.read();
        let value = data.get(key).ok_or(StorageError::NotFound)?;
        if offset > value.len() as u64 {
            return Err(StorageError::NotFound);
        }
        Ok(Box::new(Cursor::new(value[offset as usize..].to_vec())))
    }

    fn execute(
        &self,
        table: &str,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let tab = self.table_or_create(table);
        // this table stays locked for the whole transaction
        let mut data = tab.data.write();

        let mut tx = MemTx::default();
        f(&mut tx)?;

        for (key, value) in tx.changes {
            match value {
                Some(bytes) => {
                    data.insert(key, bytes);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        self.tables.write().remove(table);
        Ok(())
    }
}
