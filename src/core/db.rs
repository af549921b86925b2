//! Connection setup and open/create-or-migrate logic.
//!
//! `open_or_create` is the schema migrator: a missing file is built from the
//! full current DDL in one transaction (and deleted again if any step fails),
//! an existing file has its stored version checked and upgraded stepwise.
//! A file written by a newer schema version is refused rather than touched.

use crate::core::error::CelltraceError;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;

pub fn db_connect(db_path: &str) -> Result<Connection, CelltraceError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

pub(crate) fn open_or_create(path: &Path) -> Result<(), CelltraceError> {
    if path.exists() {
        migrate_existing(path)
    } else {
        create_new(path)
    }
}

fn create_new(path: &Path) -> Result<(), CelltraceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let result = (|| {
        let mut conn = db_connect(&path.to_string_lossy())?;
        let tx = conn.transaction()?;
        for ddl in schemas::LATEST_DDL {
            tx.execute(ddl, [])?;
        }
        tx.execute(
            "INSERT INTO schema_version(version) VALUES (?1)",
            params![schemas::LATEST_SCHEMA_VERSION],
        )?;
        tx.commit()?;
        Ok(())
    })();

    if result.is_err() {
        // Never leave a half-built file behind.
        let _ = fs::remove_file(path);
        let _ = fs::remove_file(sidecar(path, "-wal"));
        let _ = fs::remove_file(sidecar(path, "-shm"));
    }
    result
}

fn sidecar(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    s.into()
}

fn migrate_existing(path: &Path) -> Result<(), CelltraceError> {
    let mut conn = db_connect(&path.to_string_lossy())?;
    let stored = read_version(&conn)?;

    if stored > schemas::LATEST_SCHEMA_VERSION {
        return Err(CelltraceError::UnsupportedNewerVersion {
            found: stored,
            supported: schemas::LATEST_SCHEMA_VERSION,
        });
    }
    if stored == schemas::LATEST_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    if stored < 2 {
        upgrade_v1_to_v2(&tx)?;
    }
    tx.execute(
        "UPDATE schema_version SET version = ?1",
        params![schemas::LATEST_SCHEMA_VERSION],
    )?;
    tx.commit()?;

    // Best-effort space reclamation after an upgrade; failure is non-fatal.
    let _ = conn.execute("VACUUM", []);
    Ok(())
}

fn read_version(conn: &Connection) -> Result<i64, CelltraceError> {
    let row = conn
        .query_row("SELECT version FROM schema_version", [], |r| r.get(0))
        .optional();
    match row {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Err(CelltraceError::CorruptFile(
            "schema_version table is empty".to_string(),
        )),
        Err(e) => Err(CelltraceError::CorruptFile(format!(
            "schema_version table is missing or unreadable: {e}"
        ))),
    }
}

fn upgrade_v1_to_v2(tx: &rusqlite::Transaction<'_>) -> Result<(), CelltraceError> {
    tx.execute("ALTER TABLE event_log ADD COLUMN tools TEXT", [])?;
    tx.execute(schemas::IDX_EVENT_MATERIAL_MAT, [])?;
    Ok(())
}

/// Stored schema version of an already-open store file.
pub fn schema_version(path: &Path) -> Result<i64, CelltraceError> {
    let conn = db_connect(&path.to_string_lossy())?;
    read_version(&conn)
}
