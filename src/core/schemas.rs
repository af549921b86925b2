//! Centralized schema definitions for the celltrace store.
//!
//! One SQLite database holds four groups of tables:
//! 1. schema_version: a single-row version marker checked at open.
//! 2. material_slots: the material-identity allocator rows.
//! 3. event_log / event_material: the append-only manufacturing event log.
//! 4. schedules / jobs / workorders / programs / station_use: planned work.
//!
//! Upgrade history:
//! - v1: initial schema, no `tools` column on event_log and no secondary
//!   index on event_material(material_id).
//! - v2: adds both (see `db::upgrade_v1_to_v2`).

pub const LATEST_SCHEMA_VERSION: i64 = 2;

pub const SCHEMA_VERSION: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    )";

// --- Material identity allocator ---

pub const MATERIAL_SLOTS: &str = "
    CREATE TABLE IF NOT EXISTS material_slots (
        pallet TEXT NOT NULL,
        fixture_num INTEGER NOT NULL,
        loaded_utc INTEGER NOT NULL,
        loc_counter INTEGER NOT NULL,
        order_name TEXT NOT NULL,
        material_id INTEGER NOT NULL,
        PRIMARY KEY(pallet, fixture_num, loaded_utc, loc_counter)
    )";
pub const IDX_MATERIAL_SLOTS_MAT: &str =
    "CREATE INDEX IF NOT EXISTS idx_material_slots_mat ON material_slots(material_id)";

// --- Event log ---

pub const EVENT_LOG: &str = "
    CREATE TABLE IF NOT EXISTS event_log (
        counter INTEGER PRIMARY KEY,
        log_type INTEGER NOT NULL,
        start_of_cycle INTEGER NOT NULL,
        end_time INTEGER NOT NULL,
        loc_name TEXT NOT NULL,
        loc_num INTEGER NOT NULL,
        pallet TEXT NOT NULL,
        program TEXT NOT NULL,
        result TEXT NOT NULL,
        elapsed_ms INTEGER NOT NULL,
        active_ms INTEGER NOT NULL,
        details TEXT,
        tools TEXT
    )";
pub const IDX_EVENT_LOG_TIME: &str =
    "CREATE INDEX IF NOT EXISTS idx_event_log_time ON event_log(end_time)";

pub const EVENT_MATERIAL: &str = "
    CREATE TABLE IF NOT EXISTS event_material (
        counter INTEGER NOT NULL,
        mat_order INTEGER NOT NULL,
        material_id INTEGER NOT NULL,
        job_unique TEXT NOT NULL,
        part_name TEXT NOT NULL,
        process INTEGER NOT NULL,
        num_processes INTEGER NOT NULL,
        face TEXT NOT NULL,
        serial TEXT,
        workorder TEXT,
        PRIMARY KEY(counter, mat_order)
    )";
pub const IDX_EVENT_MATERIAL_MAT: &str =
    "CREATE INDEX IF NOT EXISTS idx_event_material_mat ON event_material(material_id)";

// --- Job / schedule store ---

pub const SCHEDULES: &str = "
    CREATE TABLE IF NOT EXISTS schedules (
        schedule_id TEXT PRIMARY KEY,
        downloaded_utc INTEGER NOT NULL,
        updated_utc INTEGER NOT NULL
    )";

pub const JOBS: &str = "
    CREATE TABLE IF NOT EXISTS jobs (
        unique_str TEXT PRIMARY KEY,
        part_name TEXT NOT NULL,
        plan_quantity INTEGER NOT NULL,
        priority INTEGER NOT NULL,
        schedule_id TEXT,
        route_start INTEGER NOT NULL,
        route_end INTEGER NOT NULL,
        comment TEXT
    )";
pub const IDX_JOBS_SCHEDULE: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_schedule ON jobs(schedule_id)";
pub const IDX_JOBS_ROUTE_START: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_route_start ON jobs(route_start)";

pub const WORKORDERS: &str = "
    CREATE TABLE IF NOT EXISTS workorders (
        workorder_id TEXT NOT NULL,
        part TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        due_date INTEGER NOT NULL,
        priority INTEGER NOT NULL,
        schedule_id TEXT NOT NULL,
        finalized_utc INTEGER,
        PRIMARY KEY(workorder_id, part, schedule_id)
    )";

pub const PROGRAMS: &str = "
    CREATE TABLE IF NOT EXISTS programs (
        program_name TEXT NOT NULL,
        revision INTEGER NOT NULL,
        schedule_id TEXT NOT NULL,
        comment TEXT NOT NULL,
        PRIMARY KEY(program_name, revision, schedule_id)
    )";

pub const STATION_USE: &str = "
    CREATE TABLE IF NOT EXISTS station_use (
        schedule_id TEXT NOT NULL,
        station_group TEXT NOT NULL,
        start_utc INTEGER NOT NULL,
        end_utc INTEGER NOT NULL,
        plan_down INTEGER NOT NULL
    )";

/// Full DDL for the latest schema version, applied in order on create.
pub const LATEST_DDL: &[&str] = &[
    SCHEMA_VERSION,
    MATERIAL_SLOTS,
    IDX_MATERIAL_SLOTS_MAT,
    EVENT_LOG,
    IDX_EVENT_LOG_TIME,
    EVENT_MATERIAL,
    IDX_EVENT_MATERIAL_MAT,
    SCHEDULES,
    JOBS,
    IDX_JOBS_SCHEDULE,
    IDX_JOBS_ROUTE_START,
    WORKORDERS,
    PROGRAMS,
    STATION_USE,
];
