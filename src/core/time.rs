//! UTC timestamp helpers.
//!
//! Every instant in the store is persisted as integer milliseconds since the
//! Unix epoch (INTEGER column affinity), and exposed as `DateTime<Utc>` at
//! the API surface.

use crate::core::error::CelltraceError;
use chrono::{DateTime, TimeZone, Utc};

pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Result<DateTime<Utc>, CelltraceError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| CelltraceError::CorruptFile(format!("timestamp {ms} is out of range")))
}
