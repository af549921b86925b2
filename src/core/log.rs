//! EventLogStore: the append-only, strictly ordered manufacturing event log.
//!
//! Counters are assigned as `1 + max(counter)` inside the same transaction
//! that inserts the row, under the store's writer lock (see `store.rs` for
//! why the lock is required on top of the transaction). Entries are never
//! deleted; the one permitted mutation is `edit_material`, which remaps a
//! misidentified material id across the whole log atomically.

use crate::core::error::CelltraceError;
use crate::core::events::{LogEntry, LogMaterial, LogType, NewLogEntry, ToolUse};
use crate::core::store::Store;
use crate::core::time;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;

const INSERT_ENTRY: &str = "
    INSERT INTO event_log(counter, log_type, start_of_cycle, end_time, loc_name,
                          loc_num, pallet, program, result, elapsed_ms, active_ms,
                          details, tools)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

const INSERT_MATERIAL: &str = "
    INSERT INTO event_material(counter, mat_order, material_id, job_unique,
                               part_name, process, num_processes, face, serial,
                               workorder)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const SELECT_ENTRY: &str = "
    SELECT counter, log_type, start_of_cycle, end_time, loc_name, loc_num,
           pallet, program, result, elapsed_ms, active_ms, details, tools
    FROM event_log";

const SELECT_MATERIAL: &str = "
    SELECT material_id, job_unique, part_name, process, num_processes, face,
           serial, workorder
    FROM event_material WHERE counter = ?1 ORDER BY mat_order";

impl Store {
    /// Append an entry, assigning the next counter. Content is never
    /// rejected; the only failure mode is the storage transaction itself, in
    /// which case nothing is appended.
    pub fn append(&self, entry: NewLogEntry) -> Result<LogEntry, CelltraceError> {
        let details = if entry.program_details.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&entry.program_details)?)
        };
        let tools = if entry.tools.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&entry.tools)?)
        };

        self.with_write(|conn| {
            let tx = conn.transaction()?;
            let max: i64 =
                tx.query_row("SELECT COALESCE(MAX(counter), 0) FROM event_log", [], |r| {
                    r.get(0)
                })?;
            let counter = max + 1;

            tx.execute(
                INSERT_ENTRY,
                params![
                    counter,
                    entry.log_type.tag(),
                    entry.start_of_cycle,
                    time::to_millis(entry.end_time),
                    entry.location_name,
                    entry.location_num,
                    entry.pallet,
                    entry.program,
                    entry.result,
                    entry.elapsed.num_milliseconds(),
                    entry.active.num_milliseconds(),
                    details,
                    tools,
                ],
            )?;
            {
                let mut stmt = tx.prepare(INSERT_MATERIAL)?;
                for (i, m) in entry.material.iter().enumerate() {
                    stmt.execute(params![
                        counter,
                        i as i64,
                        m.material_id,
                        m.job_unique,
                        m.part_name,
                        m.process,
                        m.num_processes,
                        m.face,
                        m.serial,
                        m.workorder,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(entry.into_entry(counter))
        })
    }

    /// Entries with `start <= end_time < end`, ordered by counter.
    pub fn load_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, CelltraceError> {
        self.with_read(|conn| {
            load_entries(
                conn,
                &format!("{SELECT_ENTRY} WHERE end_time >= ?1 AND end_time < ?2 ORDER BY counter"),
                params![time::to_millis(start), time::to_millis(end)],
            )
        })
    }

    /// Entries with counter strictly greater than `counter`, ordered by
    /// counter. Used for incremental catch-up: counter uniqueness and
    /// monotonicity guarantee a consumer never skips or re-sees an entry.
    pub fn load_after_counter(&self, counter: i64) -> Result<Vec<LogEntry>, CelltraceError> {
        self.with_read(|conn| {
            load_entries(
                conn,
                &format!("{SELECT_ENTRY} WHERE counter > ?1 ORDER BY counter"),
                params![counter],
            )
        })
    }

    /// Rewrite every material reference to `old_id` across the entire log to
    /// `new_id`, atomically. Returns the number of rows updated. Counters and
    /// all other fields are preserved; history is never deleted.
    pub fn edit_material(&self, old_id: i64, new_id: i64) -> Result<usize, CelltraceError> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE event_material SET material_id = ?2 WHERE material_id = ?1",
                params![old_id, new_id],
            )?;
            tx.commit()?;
            Ok(updated)
        })
    }
}

struct EventRow {
    counter: i64,
    log_type: i64,
    start_of_cycle: bool,
    end_time: i64,
    loc_name: String,
    loc_num: i32,
    pallet: String,
    program: String,
    result: String,
    elapsed_ms: i64,
    active_ms: i64,
    details: Option<String>,
    tools: Option<String>,
}

/// Run an entry query and reconstruct full `LogEntry` values, inside one
/// deferred transaction so the entry and material reads see one snapshot.
fn load_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<LogEntry>, CelltraceError> {
    let tx = conn.unchecked_transaction()?;

    let mut raw = Vec::new();
    {
        let mut stmt = tx.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(EventRow {
                counter: row.get(0)?,
                log_type: row.get(1)?,
                start_of_cycle: row.get(2)?,
                end_time: row.get(3)?,
                loc_name: row.get(4)?,
                loc_num: row.get(5)?,
                pallet: row.get(6)?,
                program: row.get(7)?,
                result: row.get(8)?,
                elapsed_ms: row.get(9)?,
                active_ms: row.get(10)?,
                details: row.get(11)?,
                tools: row.get(12)?,
            })
        })?;
        for row in rows {
            raw.push(row?);
        }
    }

    let mut entries = Vec::with_capacity(raw.len());
    {
        let mut mat_stmt = tx.prepare(SELECT_MATERIAL)?;
        for row in raw {
            let mats = mat_stmt.query_map(params![row.counter], |m| {
                Ok(LogMaterial {
                    material_id: m.get(0)?,
                    job_unique: m.get(1)?,
                    part_name: m.get(2)?,
                    process: m.get(3)?,
                    num_processes: m.get(4)?,
                    face: m.get(5)?,
                    serial: m.get(6)?,
                    workorder: m.get(7)?,
                })
            })?;
            let mut material = Vec::new();
            for m in mats {
                material.push(m?);
            }
            entries.push(entry_from_row(row, material)?);
        }
    }

    tx.commit()?;
    Ok(entries)
}

fn entry_from_row(row: EventRow, material: Vec<LogMaterial>) -> Result<LogEntry, CelltraceError> {
    let log_type = LogType::from_tag(row.log_type).ok_or_else(|| {
        CelltraceError::CorruptFile(format!(
            "entry {} has unknown log type tag {}",
            row.counter, row.log_type
        ))
    })?;
    let program_details: BTreeMap<String, String> = match row.details {
        Some(json) => serde_json::from_str(&json)?,
        None => BTreeMap::new(),
    };
    let tools: BTreeMap<String, ToolUse> = match row.tools {
        Some(json) => serde_json::from_str(&json)?,
        None => BTreeMap::new(),
    };
    Ok(LogEntry {
        counter: row.counter,
        material,
        log_type,
        start_of_cycle: row.start_of_cycle,
        end_time: time::from_millis(row.end_time)?,
        location_name: row.loc_name,
        location_num: row.loc_num,
        pallet: row.pallet,
        program: row.program,
        result: row.result,
        elapsed: Duration::milliseconds(row.elapsed_ms),
        active: Duration::milliseconds(row.active_ms),
        program_details,
        tools,
    })
}
