//! Compile-time backend registry.
//!
//! The deployment picks a backend in configuration; every backend is a
//! concrete type registered here. The capability set is split into three
//! traits so collaborators depend only on what they use: station-integration
//! code takes an `AllocatorStorage`, the API layer a `LogStorage`, reporting
//! code a `JobStorage`. No dynamic code loading, no ambient global — the
//! handle is constructed once at process start and threaded down.

use crate::core::error::CelltraceError;
use crate::core::events::{LogEntry, NewLogEntry};
use crate::core::jobs::{HistoricData, JobPlan, NewSchedule, PartWorkorder, PlannedSchedule, ProgramEntry};
use crate::core::material::{AllocatedMaterial, ResolvedMaterial};
use crate::core::store::Store;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub path: PathBuf,
}

pub fn open_backend(config: &BackendConfig) -> Result<Store, CelltraceError> {
    match config.kind {
        BackendKind::Sqlite => Store::open(&config.path),
    }
}

pub trait LogStorage {
    fn append(&self, entry: NewLogEntry) -> Result<LogEntry, CelltraceError>;
    fn load_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, CelltraceError>;
    fn load_after_counter(&self, counter: i64) -> Result<Vec<LogEntry>, CelltraceError>;
    fn edit_material(&self, old_id: i64, new_id: i64) -> Result<usize, CelltraceError>;
}

pub trait AllocatorStorage {
    fn allocate(
        &self,
        pallet: &str,
        fixture_num: i64,
        loaded_utc: DateTime<Utc>,
        order: &str,
        count: usize,
    ) -> Result<Vec<AllocatedMaterial>, CelltraceError>;
    fn resolve(
        &self,
        pallet: &str,
        fixture_num: i64,
        at_or_before: DateTime<Utc>,
    ) -> Result<Vec<ResolvedMaterial>, CelltraceError>;
    fn seed_first_material_id(&self, material_id: i64) -> Result<(), CelltraceError>;
}

pub trait JobStorage {
    fn add_schedule(&self, schedule: NewSchedule) -> Result<(), CelltraceError>;
    fn load_job(&self, unique_str: &str) -> Result<Option<JobPlan>, CelltraceError>;
    fn load_job_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoricData, CelltraceError>;
    fn load_jobs_after_schedule_id(&self, schedule_id: &str)
    -> Result<HistoricData, CelltraceError>;
    fn load_most_recent_schedule(&self) -> Result<PlannedSchedule, CelltraceError>;
    fn most_recent_unfilled_workorders_for_part(
        &self,
        part: &str,
    ) -> Result<Vec<PartWorkorder>, CelltraceError>;
    fn replace_workorders_for_schedule(
        &self,
        schedule_id: &str,
        workorders: &[PartWorkorder],
        programs: &[ProgramEntry],
        now: Option<DateTime<Utc>>,
    ) -> Result<(), CelltraceError>;
    fn finalize_workorder(
        &self,
        workorder_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, CelltraceError>;
}

impl LogStorage for Store {
    fn append(&self, entry: NewLogEntry) -> Result<LogEntry, CelltraceError> {
        Store::append(self, entry)
    }
    fn load_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, CelltraceError> {
        Store::load_range(self, start, end)
    }
    fn load_after_counter(&self, counter: i64) -> Result<Vec<LogEntry>, CelltraceError> {
        Store::load_after_counter(self, counter)
    }
    fn edit_material(&self, old_id: i64, new_id: i64) -> Result<usize, CelltraceError> {
        Store::edit_material(self, old_id, new_id)
    }
}

impl AllocatorStorage for Store {
    fn allocate(
        &self,
        pallet: &str,
        fixture_num: i64,
        loaded_utc: DateTime<Utc>,
        order: &str,
        count: usize,
    ) -> Result<Vec<AllocatedMaterial>, CelltraceError> {
        Store::allocate(self, pallet, fixture_num, loaded_utc, order, count)
    }
    fn resolve(
        &self,
        pallet: &str,
        fixture_num: i64,
        at_or_before: DateTime<Utc>,
    ) -> Result<Vec<ResolvedMaterial>, CelltraceError> {
        Store::resolve(self, pallet, fixture_num, at_or_before)
    }
    fn seed_first_material_id(&self, material_id: i64) -> Result<(), CelltraceError> {
        Store::seed_first_material_id(self, material_id)
    }
}

impl JobStorage for Store {
    fn add_schedule(&self, schedule: NewSchedule) -> Result<(), CelltraceError> {
        Store::add_schedule(self, schedule)
    }
    fn load_job(&self, unique_str: &str) -> Result<Option<JobPlan>, CelltraceError> {
        Store::load_job(self, unique_str)
    }
    fn load_job_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoricData, CelltraceError> {
        Store::load_job_history(self, start, end)
    }
    fn load_jobs_after_schedule_id(
        &self,
        schedule_id: &str,
    ) -> Result<HistoricData, CelltraceError> {
        Store::load_jobs_after_schedule_id(self, schedule_id)
    }
    fn load_most_recent_schedule(&self) -> Result<PlannedSchedule, CelltraceError> {
        Store::load_most_recent_schedule(self)
    }
    fn most_recent_unfilled_workorders_for_part(
        &self,
        part: &str,
    ) -> Result<Vec<PartWorkorder>, CelltraceError> {
        Store::most_recent_unfilled_workorders_for_part(self, part)
    }
    fn replace_workorders_for_schedule(
        &self,
        schedule_id: &str,
        workorders: &[PartWorkorder],
        programs: &[ProgramEntry],
        now: Option<DateTime<Utc>>,
    ) -> Result<(), CelltraceError> {
        Store::replace_workorders_for_schedule(self, schedule_id, workorders, programs, now)
    }
    fn finalize_workorder(
        &self,
        workorder_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, CelltraceError> {
        Store::finalize_workorder(self, workorder_id, now)
    }
}
