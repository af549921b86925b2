//! celltrace: embedded transactional record-keeping for a manufacturing cell.
//!
//! Three stores share one SQLite file:
//!
//! - **MaterialIdAllocator** ([`core::material`]): assigns and re-resolves
//!   globally unique material identities keyed by a physical
//!   `(pallet, fixture, load-time)` slot.
//! - **EventLogStore** ([`core::log`]): the append-only, strictly ordered log
//!   of machine/operator events, each referencing zero or more material
//!   identities.
//! - **JobScheduleStore** ([`core::jobs`]): planned work, workorders,
//!   programs, and schedules, with temporal and schedule-id range queries.
//!
//! Opening the store ([`Store::open`]) verifies and upgrades the on-disk
//! schema version transactionally; a file from a newer schema is refused.
//!
//! # Concurrency
//!
//! The store is written by independent threads representing station
//! reporters and maintenance tools. Every mutating operation that reads an
//! aggregate (max counter, max material id) before inserting runs under a
//! per-store writer mutex in addition to its SQLite transaction; reads run
//! concurrently over WAL snapshots. No operation blocks on external I/O
//! while holding the lock.
//!
//! The HTTP/API layer, front end, and reporting tools live outside this
//! crate; they consume the wire representation in [`core::events`] and the
//! capability traits in [`core::backend`].

pub mod cli;
pub mod core;

pub use core::error::CelltraceError;
pub use core::store::Store;
