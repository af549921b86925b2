//! Store handle with serialized write access.
//!
//! Every mutating operation in this crate combines a read of an aggregate
//! (max counter, max material id) with a subsequent insert. A storage
//! transaction alone does not stop two writers from both reading the same max
//! before either commits, so the store layers a per-instance writer mutex
//! around the whole read-then-insert sequence. Reads open fresh connections
//! without the lock; WAL mode keeps them concurrent.

use crate::core::db;
use crate::core::error::CelltraceError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub struct Store {
    db_path: PathBuf,
    writer: Mutex<()>,
}

impl Store {
    /// Open or create the store at `path`, verifying and upgrading the schema
    /// version as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Store, CelltraceError> {
        let db_path = path.as_ref().to_path_buf();
        db::open_or_create(&db_path)?;
        Ok(Store {
            db_path,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Stored schema version (after any upgrade applied at open).
    pub fn schema_version(&self) -> Result<i64, CelltraceError> {
        db::schema_version(&self.db_path)
    }

    /// Execute a closure with a write connection. The writer lock is held for
    /// the whole closure so no other write on this store instance can
    /// interleave with a read-aggregate-then-insert sequence.
    pub(crate) fn with_write<F, R>(&self, f: F) -> Result<R, CelltraceError>
    where
        F: FnOnce(&mut Connection) -> Result<R, CelltraceError>,
    {
        let _guard = self
            .writer
            .lock()
            .map_err(|_| CelltraceError::Validation("store writer lock poisoned".to_string()))?;
        let mut conn = db::db_connect(&self.db_path.to_string_lossy())?;
        f(&mut conn)
    }

    /// Execute a closure with a read connection (no writer lock). Multi-step
    /// reads open a deferred transaction inside the closure for a consistent
    /// snapshot.
    pub(crate) fn with_read<F, R>(&self, f: F) -> Result<R, CelltraceError>
    where
        F: FnOnce(&Connection) -> Result<R, CelltraceError>,
    {
        let conn = db::db_connect(&self.db_path.to_string_lossy())?;
        f(&conn)
    }
}
