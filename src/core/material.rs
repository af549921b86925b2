//! MaterialIdAllocator: stable numeric identities for physical parts.
//!
//! Station reports arrive delayed and out of order; the allocator lets them
//! agree on an identity by keying slots on the physical world:
//! `(pallet, fixture_num, loaded_utc, loc_counter)`. Material ids are issued
//! once, never reused, never mutated. The read-max-then-insert sequence in
//! `allocate` runs under the store's writer lock — without it two concurrent
//! callers can observe the same max and hand out colliding identities.

use crate::core::error::CelltraceError;
use crate::core::store::Store;
use crate::core::time;
use chrono::{DateTime, Utc};
use rusqlite::params;

/// Sentinel slot key used by `seed_first_material_id`.
const SEED_PALLET: &str = "-1";
const SEED_FIXTURE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedMaterial {
    pub loc_counter: i64,
    pub material_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMaterial {
    pub loc_counter: i64,
    pub order: String,
    pub material_id: i64,
}

impl Store {
    /// Create `count` identity slots for a freshly loaded batch. Ids are
    /// `1 + max(material_id)` onward; loc_counters are 0-based and
    /// contiguous within the batch.
    pub fn allocate(
        &self,
        pallet: &str,
        fixture_num: i64,
        loaded_utc: DateTime<Utc>,
        order: &str,
        count: usize,
    ) -> Result<Vec<AllocatedMaterial>, CelltraceError> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            let max: i64 = tx.query_row(
                "SELECT COALESCE(MAX(material_id), 0) FROM material_slots",
                [],
                |r| r.get(0),
            )?;

            let mut out = Vec::with_capacity(count);
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO material_slots(pallet, fixture_num, loaded_utc,
                                                loc_counter, order_name, material_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for i in 0..count as i64 {
                    let material_id = max + 1 + i;
                    stmt.execute(params![
                        pallet,
                        fixture_num,
                        time::to_millis(loaded_utc),
                        i,
                        order,
                        material_id,
                    ])?;
                    out.push(AllocatedMaterial {
                        loc_counter: i,
                        material_id,
                    });
                }
            }
            tx.commit()?;
            Ok(out)
        })
    }

    /// Re-resolve the batch most recently loaded onto `(pallet, fixture_num)`
    /// at or before the given instant: find the greatest qualifying
    /// `loaded_utc`, then return every slot sharing that exact timestamp,
    /// ordered by loc_counter. Both steps run in one deferred transaction so
    /// a concurrent allocate cannot slip a newer batch between them. Empty
    /// when nothing qualifies.
    pub fn resolve(
        &self,
        pallet: &str,
        fixture_num: i64,
        at_or_before: DateTime<Utc>,
    ) -> Result<Vec<ResolvedMaterial>, CelltraceError> {
        self.with_read(|conn| {
            let tx = conn.unchecked_transaction()?;

            let loaded: Option<i64> = tx.query_row(
                "SELECT MAX(loaded_utc) FROM material_slots
                 WHERE pallet = ?1 AND fixture_num = ?2 AND loaded_utc <= ?3",
                params![pallet, fixture_num, time::to_millis(at_or_before)],
                |r| r.get(0),
            )?;
            let Some(loaded) = loaded else {
                return Ok(Vec::new());
            };

            let mut out = Vec::new();
            {
                let mut stmt = tx.prepare(
                    "SELECT loc_counter, order_name, material_id FROM material_slots
                     WHERE pallet = ?1 AND fixture_num = ?2 AND loaded_utc = ?3
                     ORDER BY loc_counter",
                )?;
                let rows = stmt.query_map(params![pallet, fixture_num, loaded], |r| {
                    Ok(ResolvedMaterial {
                        loc_counter: r.get(0)?,
                        order: r.get(1)?,
                        material_id: r.get(2)?,
                    })
                })?;
                for row in rows {
                    out.push(row?);
                }
            }
            tx.commit()?;
            Ok(out)
        })
    }

    /// Insert a sentinel slot establishing a floor for max-based allocation,
    /// used once at first-time setup to align numbering with a pre-existing
    /// external scheme. A second call inserts a second distinct floor row;
    /// callers are responsible for calling this at most once.
    pub fn seed_first_material_id(&self, material_id: i64) -> Result<(), CelltraceError> {
        self.with_write(|conn| {
            let tx = conn.transaction()?;
            let prev: Option<i64> = tx.query_row(
                "SELECT MIN(loc_counter) FROM material_slots
                 WHERE pallet = ?1 AND fixture_num = ?2",
                params![SEED_PALLET, SEED_FIXTURE],
                |r| r.get(0),
            )?;
            let loc_counter = prev.map_or(-1, |p| p - 1);
            tx.execute(
                "INSERT INTO material_slots(pallet, fixture_num, loaded_utc,
                                            loc_counter, order_name, material_id)
                 VALUES (?1, ?2, ?3, ?4, '', ?5)",
                params![SEED_PALLET, SEED_FIXTURE, i64::MIN, loc_counter, material_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}
