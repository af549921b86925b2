//! JobScheduleStore: planned work, workorders, programs, and schedules.
//!
//! Schedules arrive as whole planning generations and are replaced wholesale,
//! never incrementally patched. Schedule ids are caller-assigned and
//! monotonically increasing; the store orders them by plain string
//! comparison, so "most recent" and "after X" queries are well-defined.

use crate::core::error::CelltraceError;
use crate::core::store::Store;
use crate::core::time;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Transaction, params};
use serde::{Deserialize, Serialize};

/// A planned job, keyed by its unique string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPlan {
    pub unique_str: String,
    pub part_name: String,
    pub plan_quantity: i32,
    pub priority: i32,
    pub schedule_id: Option<String>,
    pub route_start: DateTime<Utc>,
    pub route_end: DateTime<Utc>,
    pub comment: Option<String>,
}

/// A customer order correlated with completed parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartWorkorder {
    pub workorder_id: String,
    pub part: String,
    pub quantity: i32,
    pub due_date: DateTime<Utc>,
    pub priority: i32,
    pub finalized: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub program_name: String,
    pub revision: i64,
    pub comment: String,
}

/// Simulated station utilization attached to a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationUse {
    pub schedule_id: String,
    pub station_group: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub plan_down: bool,
}

/// The most recent planning generation. `schedule_id == None` is the explicit
/// empty value returned for a store with no schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSchedule {
    pub schedule_id: Option<String>,
    pub jobs: Vec<JobPlan>,
}

/// Jobs plus station utilization intersecting a query window or schedule
/// range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricData {
    pub jobs: Vec<JobPlan>,
    pub station_use: Vec<StationUse>,
}

/// One whole planning generation, inserted atomically by `add_schedule`.
/// Per-row schedule ids in `jobs` and `station_use` are overridden by
/// `schedule_id`.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub schedule_id: String,
    pub downloaded: DateTime<Utc>,
    pub jobs: Vec<JobPlan>,
    pub workorders: Vec<PartWorkorder>,
    pub programs: Vec<ProgramEntry>,
    pub station_use: Vec<StationUse>,
}

const SELECT_JOB: &str = "
    SELECT unique_str, part_name, plan_quantity, priority, schedule_id,
           route_start, route_end, comment
    FROM jobs";

const SELECT_WORKORDER: &str = "
    SELECT workorder_id, part, quantity, due_date, priority, finalized_utc
    FROM workorders";

const SELECT_STATION_USE: &str = "
    SELECT schedule_id, station_group, start_utc, end_utc, plan_down
    FROM station_use";

impl Store {
    /// Insert a whole planning generation in one transaction.
    pub fn add_schedule(&self, schedule: NewSchedule) -> Result<(), CelltraceError> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO schedules(schedule_id, downloaded_utc, updated_utc)
                 VALUES (?1, ?2, ?2)",
                params![schedule.schedule_id, time::to_millis(schedule.downloaded)],
            )?;
            for job in &schedule.jobs {
                tx.execute(
                    "INSERT INTO jobs(unique_str, part_name, plan_quantity, priority,
                                      schedule_id, route_start, route_end, comment)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        job.unique_str,
                        job.part_name,
                        job.plan_quantity,
                        job.priority,
                        schedule.schedule_id,
                        time::to_millis(job.route_start),
                        time::to_millis(job.route_end),
                        job.comment,
                    ],
                )?;
            }
            insert_workorders(&tx, &schedule.schedule_id, &schedule.workorders)?;
            insert_programs(&tx, &schedule.schedule_id, &schedule.programs)?;
            for su in &schedule.station_use {
                tx.execute(
                    "INSERT INTO station_use(schedule_id, station_group, start_utc,
                                             end_utc, plan_down)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        schedule.schedule_id,
                        su.station_group,
                        time::to_millis(su.start),
                        time::to_millis(su.end),
                        su.plan_down,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Look up a job plan; a miss is `None`, not an error.
    pub fn load_job(&self, unique_str: &str) -> Result<Option<JobPlan>, CelltraceError> {
        self.with_read(|conn| {
            let job = conn
                .query_row(
                    &format!("{SELECT_JOB} WHERE unique_str = ?1"),
                    params![unique_str],
                    job_from_row,
                )
                .optional()?;
            job.map(finish_job).transpose()
        })
    }

    /// Every job whose `[route_start, route_end)` intersects `[start, end)`,
    /// plus station utilization rows intersecting the same window.
    pub fn load_job_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoricData, CelltraceError> {
        let (start_ms, end_ms) = (time::to_millis(start), time::to_millis(end));
        self.with_read(|conn| {
            let tx = conn.unchecked_transaction()?;
            let jobs = collect_jobs(
                &tx,
                &format!("{SELECT_JOB} WHERE route_start < ?2 AND ?1 < route_end ORDER BY unique_str"),
                params![start_ms, end_ms],
            )?;
            let station_use = collect_station_use(
                &tx,
                &format!(
                    "{SELECT_STATION_USE} WHERE start_utc < ?2 AND ?1 < end_utc
                     ORDER BY schedule_id, station_group"
                ),
                params![start_ms, end_ms],
            )?;
            tx.commit()?;
            Ok(HistoricData { jobs, station_use })
        })
    }

    /// Jobs and station utilization for every schedule with an id strictly
    /// greater than the given one.
    pub fn load_jobs_after_schedule_id(
        &self,
        schedule_id: &str,
    ) -> Result<HistoricData, CelltraceError> {
        self.with_read(|conn| {
            let tx = conn.unchecked_transaction()?;
            let jobs = collect_jobs(
                &tx,
                &format!("{SELECT_JOB} WHERE schedule_id > ?1 ORDER BY schedule_id, unique_str"),
                params![schedule_id],
            )?;
            let station_use = collect_station_use(
                &tx,
                &format!(
                    "{SELECT_STATION_USE} WHERE schedule_id > ?1
                     ORDER BY schedule_id, station_group"
                ),
                params![schedule_id],
            )?;
            tx.commit()?;
            Ok(HistoricData { jobs, station_use })
        })
    }

    /// The schedule with the greatest id and its jobs; the explicit empty
    /// value on an empty store.
    pub fn load_most_recent_schedule(&self) -> Result<PlannedSchedule, CelltraceError> {
        self.with_read(|conn| {
            let tx = conn.unchecked_transaction()?;
            let latest: Option<String> =
                tx.query_row("SELECT MAX(schedule_id) FROM schedules", [], |r| r.get(0))?;
            let Some(schedule_id) = latest else {
                return Ok(PlannedSchedule {
                    schedule_id: None,
                    jobs: Vec::new(),
                });
            };
            let jobs = collect_jobs(
                &tx,
                &format!("{SELECT_JOB} WHERE schedule_id = ?1 ORDER BY unique_str"),
                params![schedule_id],
            )?;
            tx.commit()?;
            Ok(PlannedSchedule {
                schedule_id: Some(schedule_id),
                jobs,
            })
        })
    }

    /// Workorders for `part` from the most recent schedule that has any, not
    /// yet finalized. Both steps run in one deferred transaction, mirroring
    /// the allocator's resolve.
    pub fn most_recent_unfilled_workorders_for_part(
        &self,
        part: &str,
    ) -> Result<Vec<PartWorkorder>, CelltraceError> {
        self.with_read(|conn| {
            let tx = conn.unchecked_transaction()?;
            let latest: Option<String> = tx.query_row(
                "SELECT MAX(schedule_id) FROM workorders WHERE part = ?1",
                params![part],
                |r| r.get(0),
            )?;
            let Some(schedule_id) = latest else {
                return Ok(Vec::new());
            };
            let workorders = collect_workorders(
                &tx,
                &format!(
                    "{SELECT_WORKORDER} WHERE part = ?1 AND schedule_id = ?2
                     AND finalized_utc IS NULL ORDER BY workorder_id"
                ),
                params![part, schedule_id],
            )?;
            tx.commit()?;
            Ok(workorders)
        })
    }

    /// Atomically delete all workorder and program rows for `schedule_id` and
    /// insert the new sets. Fails `NotFound` when the schedule does not
    /// exist; partial replacement is never observable.
    pub fn replace_workorders_for_schedule(
        &self,
        schedule_id: &str,
        workorders: &[PartWorkorder],
        programs: &[ProgramEntry],
        now: Option<DateTime<Utc>>,
    ) -> Result<(), CelltraceError> {
        let now = now.unwrap_or_else(Utc::now);
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM schedules WHERE schedule_id = ?1",
                    params![schedule_id],
                    |r| r.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(CelltraceError::NotFound(format!(
                    "schedule {schedule_id}"
                )));
            }

            tx.execute(
                "DELETE FROM workorders WHERE schedule_id = ?1",
                params![schedule_id],
            )?;
            tx.execute(
                "DELETE FROM programs WHERE schedule_id = ?1",
                params![schedule_id],
            )?;
            insert_workorders(&tx, schedule_id, workorders)?;
            insert_programs(&tx, schedule_id, programs)?;
            tx.execute(
                "UPDATE schedules SET updated_utc = ?2 WHERE schedule_id = ?1",
                params![schedule_id, time::to_millis(now)],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Stamp `finalized` on every not-yet-finalized row for the workorder id.
    /// Returns the number of rows stamped.
    pub fn finalize_workorder(
        &self,
        workorder_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, CelltraceError> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            let stamped = tx.execute(
                "UPDATE workorders SET finalized_utc = ?2
                 WHERE workorder_id = ?1 AND finalized_utc IS NULL",
                params![workorder_id, time::to_millis(now)],
            )?;
            tx.commit()?;
            Ok(stamped)
        })
    }
}

struct JobRow {
    unique_str: String,
    part_name: String,
    plan_quantity: i32,
    priority: i32,
    schedule_id: Option<String>,
    route_start: i64,
    route_end: i64,
    comment: Option<String>,
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRow> {
    Ok(JobRow {
        unique_str: row.get(0)?,
        part_name: row.get(1)?,
        plan_quantity: row.get(2)?,
        priority: row.get(3)?,
        schedule_id: row.get(4)?,
        route_start: row.get(5)?,
        route_end: row.get(6)?,
        comment: row.get(7)?,
    })
}

fn finish_job(row: JobRow) -> Result<JobPlan, CelltraceError> {
    Ok(JobPlan {
        unique_str: row.unique_str,
        part_name: row.part_name,
        plan_quantity: row.plan_quantity,
        priority: row.priority,
        schedule_id: row.schedule_id,
        route_start: time::from_millis(row.route_start)?,
        route_end: time::from_millis(row.route_end)?,
        comment: row.comment,
    })
}

fn collect_jobs(
    tx: &Transaction<'_>,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<JobPlan>, CelltraceError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map(params, job_from_row)?;
    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(finish_job(row?)?);
    }
    Ok(jobs)
}

fn collect_workorders(
    tx: &Transaction<'_>,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<PartWorkorder>, CelltraceError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i32>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i32>(4)?,
            row.get::<_, Option<i64>>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (workorder_id, part, quantity, due_ms, priority, finalized_ms) = row?;
        out.push(PartWorkorder {
            workorder_id,
            part,
            quantity,
            due_date: time::from_millis(due_ms)?,
            priority,
            finalized: finalized_ms.map(time::from_millis).transpose()?,
        });
    }
    Ok(out)
}

fn collect_station_use(
    tx: &Transaction<'_>,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<StationUse>, CelltraceError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, bool>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (schedule_id, station_group, start_ms, end_ms, plan_down) = row?;
        out.push(StationUse {
            schedule_id,
            station_group,
            start: time::from_millis(start_ms)?,
            end: time::from_millis(end_ms)?,
            plan_down,
        });
    }
    Ok(out)
}

fn insert_workorders(
    tx: &Transaction<'_>,
    schedule_id: &str,
    workorders: &[PartWorkorder],
) -> Result<(), CelltraceError> {
    let mut stmt = tx.prepare(
        "INSERT INTO workorders(workorder_id, part, quantity, due_date, priority,
                                schedule_id, finalized_utc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for wo in workorders {
        stmt.execute(params![
            wo.workorder_id,
            wo.part,
            wo.quantity,
            time::to_millis(wo.due_date),
            wo.priority,
            schedule_id,
            wo.finalized.map(time::to_millis),
        ])?;
    }
    Ok(())
}

fn insert_programs(
    tx: &Transaction<'_>,
    schedule_id: &str,
    programs: &[ProgramEntry],
) -> Result<(), CelltraceError> {
    let mut stmt = tx.prepare(
        "INSERT INTO programs(program_name, revision, schedule_id, comment)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for p in programs {
        stmt.execute(params![p.program_name, p.revision, schedule_id, p.comment])?;
    }
    Ok(())
}
