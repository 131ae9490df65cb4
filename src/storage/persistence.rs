//! Sled-backed storage
//!
//! Each table maps to a sled tree; transactions stage writes into a
//! `sled::Batch` and apply it atomically when the closure succeeds.

use std::io::{Cursor, Read};

use parking_lot::Mutex;
use sled;

use crate::error::{Error, StorageError};
use crate::storage::{Storage, Transaction};

fn backend_err(context: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("{}: {}", context, e))
}

/// Durable [`Storage`] implementation on a sled database.
pub struct SledStorage {
    db: sled::Db,
    // sled batches are not transactions; one writer at a time keeps the
    // apply-or-rollback contract
    write_lock: Mutex<()>,
}

impl SledStorage {
    /// Open or create a sled database at the given path.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| backend_err("open sled database", e))?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Wrap an existing sled database handle.
    pub fn from_db(db: sled::Db) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    fn tree(&self, table: &str) -> Result<sled::Tree, StorageError> {
        self.db
            .open_tree(table)
            .map_err(|e| backend_err("open table", e))
    }
}

struct SledTx {
    batch: sled::Batch,
}

impl Transaction for SledTx {
    fn put(&mut self, key: &str, size: u64, r: &mut dyn Read) -> Result<(), StorageError> {
        let mut data = Vec::new();
        r.take(size).read_to_end(&mut data)?;
        self.batch.insert(key.as_bytes(), data);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.batch.remove(key.as_bytes());
        Ok(())
    }
}

impl Storage for SledStorage {
    fn open_at(
        &self,
        table: &str,
        key: &str,
        offset: u64,
    ) -> Result<Box<dyn Read + Send>, StorageError> {
        let tree = self.tree(table)?;
        let data = tree
            .get(key.as_bytes())
            .map_err(|e| backend_err("read key", e))?
            .ok_or(StorageError::NotFound)?;
        if offset > data.len() as u64 {
            return Err(StorageError::NotFound);
        }
        Ok(Box::new(Cursor::new(data[offset as usize..].to_vec())))
    }

    fn execute(
        &self,
        table: &str,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let _guard = self.write_lock.lock();
        let tree = self.tree(table)?;

        let mut tx = SledTx {
            batch: sled::Batch::default(),
        };
        f(&mut tx)?;

        tree.apply_batch(tx.batch)
            .map_err(|e| backend_err("apply batch", e))?;
        tree.flush().map_err(|e| backend_err("flush", e))?;
        Ok(())
    }

    fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        self.db
            .drop_tree(table)
            .map(|_| ())
            .map_err(|e| backend_err("drop table", e))
    }
}
