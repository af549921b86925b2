use celltrace::Store;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(tmp: &TempDir) -> Store {
    Store::open(tmp.path().join("cell.db")).expect("open store")
}

#[test]
fn allocate_assigns_contiguous_ids_and_loc_counters() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let batch = store.allocate("P1", 1, t0, "W1", 3).expect("allocate");
    assert_eq!(batch.len(), 3);
    for (i, a) in batch.iter().enumerate() {
        assert_eq!(a.loc_counter, i as i64);
        assert_eq!(a.material_id, 1 + i as i64);
    }

    let batch2 = store.allocate("P2", 1, t0, "W2", 2).expect("allocate");
    assert_eq!(
        batch2.iter().map(|a| a.material_id).collect::<Vec<_>>(),
        vec![4, 5]
    );
    assert_eq!(
        batch2.iter().map(|a| a.loc_counter).collect::<Vec<_>>(),
        vec![0, 1]
    );
}

#[test]
fn seeded_floor_aligns_numbering_with_external_scheme() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    store.seed_first_material_id(100).expect("seed");

    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let batch = store.allocate("P1", 1, t0, "W1", 3).expect("allocate");
    assert_eq!(
        batch
            .iter()
            .map(|a| (a.loc_counter, a.material_id))
            .collect::<Vec<_>>(),
        vec![(0, 101), (1, 102), (2, 103)]
    );

    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
    let resolved = store.resolve("P1", 1, at).expect("resolve");
    assert_eq!(
        resolved
            .iter()
            .map(|r| (r.loc_counter, r.order.as_str(), r.material_id))
            .collect::<Vec<_>>(),
        vec![(0, "W1", 101), (1, "W1", 102), (2, "W1", 103)]
    );
}

#[test]
fn seeding_twice_creates_two_distinct_floor_rows() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    store.seed_first_material_id(50).expect("seed once");
    store.seed_first_material_id(80).expect("seed twice");

    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let batch = store.allocate("P1", 1, t0, "W1", 1).expect("allocate");
    assert_eq!(batch[0].material_id, 81);
}

#[test]
fn resolve_returns_latest_qualifying_batch_only() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let t1 = t0 + Duration::hours(1);
    let t2 = t0 + Duration::hours(2);

    store.allocate("P1", 1, t0, "W1", 2).expect("first batch");
    store.allocate("P1", 1, t1, "W2", 3).expect("second batch");
    store.allocate("P1", 2, t2, "W3", 1).expect("other fixture");

    // Before any load on this slot.
    let before = store
        .resolve("P1", 1, t0 - Duration::seconds(1))
        .expect("resolve");
    assert!(before.is_empty());

    // Exactly at the first load time.
    let at_t0 = store.resolve("P1", 1, t0).expect("resolve");
    assert_eq!(at_t0.len(), 2);
    assert!(at_t0.iter().all(|r| r.order == "W1"));

    // Between the two loads: still the first batch.
    let mid = store
        .resolve("P1", 1, t0 + Duration::minutes(30))
        .expect("resolve");
    assert_eq!(mid.len(), 2);

    // After the second load: only the second batch, never a mix.
    let late = store.resolve("P1", 1, t2).expect("resolve");
    assert_eq!(late.len(), 3);
    assert!(late.iter().all(|r| r.order == "W2"));
    assert_eq!(
        late.iter().map(|r| r.loc_counter).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    // The other fixture resolves independently.
    let fixture2 = store.resolve("P1", 2, t2).expect("resolve");
    assert_eq!(fixture2.len(), 1);
    assert_eq!(fixture2[0].order, "W3");

    // Unknown pallet is an empty result, not an error.
    let unknown = store.resolve("P9", 1, t2).expect("resolve");
    assert!(unknown.is_empty());
}

#[test]
fn concurrent_allocations_never_collide() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Arc::new(open_store(&tmp));
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    const THREADS: usize = 8;
    const BATCHES: usize = 5;
    const COUNT: usize = 3;

    let mut all_ids = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    let mut ids = Vec::new();
                    for b in 0..BATCHES {
                        let loaded = t0 + Duration::minutes((t * BATCHES + b) as i64);
                        let batch = store
                            .allocate(&format!("P{t}"), 1, loaded, "W", COUNT)
                            .expect("allocate");
                        ids.extend(batch.iter().map(|a| a.material_id));
                    }
                    ids
                })
            })
            .collect();
        for h in handles {
            all_ids.extend(h.join().expect("thread"));
        }
    });

    let total = THREADS * BATCHES * COUNT;
    assert_eq!(all_ids.len(), total);
    all_ids.sort_unstable();
    all_ids.dedup();
    assert_eq!(all_ids.len(), total, "duplicate material ids handed out");
    assert_eq!(all_ids.first(), Some(&1));
    assert_eq!(all_ids.last(), Some(&(total as i64)));
}
