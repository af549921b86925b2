use celltrace::Store;
use celltrace::core::events::{LogMaterial, LogType, NewLogEntry, ToolUse};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(tmp: &TempDir) -> Store {
    Store::open(tmp.path().join("cell.db")).expect("open store")
}

fn mat(material_id: i64) -> LogMaterial {
    LogMaterial {
        material_id,
        job_unique: "J1".to_string(),
        part_name: "widget".to_string(),
        process: 1,
        num_processes: 2,
        face: "1".to_string(),
        serial: None,
        workorder: None,
    }
}

fn cycle_at(end_time: DateTime<Utc>, material: Vec<LogMaterial>) -> NewLogEntry {
    NewLogEntry {
        material,
        log_type: LogType::MachineCycle,
        start_of_cycle: false,
        end_time,
        location_name: "MC".to_string(),
        location_num: 1,
        pallet: "P1".to_string(),
        program: "prog-7".to_string(),
        result: "".to_string(),
        elapsed: Duration::seconds(90),
        active: Duration::seconds(75),
        program_details: BTreeMap::new(),
        tools: BTreeMap::new(),
    }
}

#[test]
fn append_assigns_strictly_increasing_gapless_counters() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    for i in 1..=10i64 {
        let entry = store
            .append(cycle_at(t0 + Duration::minutes(i), vec![]))
            .expect("append");
        assert_eq!(entry.counter, i);
    }
}

#[test]
fn appended_entry_round_trips_through_the_store() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    let mut details = BTreeMap::new();
    details.insert("ProgramRevision".to_string(), "12".to_string());
    let mut tools = BTreeMap::new();
    tools.insert(
        "endmill-6".to_string(),
        ToolUse {
            elapsed: Duration::seconds(42),
            active: Duration::seconds(40),
        },
    );
    let mut material = vec![mat(5), mat(6)];
    material[1].serial = Some("S0006".to_string());
    material[1].workorder = Some("W100".to_string());

    let mut entry = cycle_at(t0, material);
    entry.program_details = details;
    entry.tools = tools;

    let committed = store.append(entry).expect("append");
    let loaded = store
        .load_after_counter(0)
        .expect("load")
        .pop()
        .expect("one entry");
    assert_eq!(loaded, committed);
    assert_eq!(loaded.material.len(), 2);
    assert_eq!(loaded.material[1].serial.as_deref(), Some("S0006"));
    assert_eq!(loaded.tools["endmill-6"].active, Duration::seconds(40));
}

#[test]
fn load_range_is_half_open_on_end_time() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    for i in 0..6i64 {
        store
            .append(cycle_at(t0 + Duration::hours(i), vec![]))
            .expect("append");
    }

    let a = t0 + Duration::hours(1);
    let b = t0 + Duration::hours(4);
    let window = store.load_range(a, b).expect("load_range");
    let times: Vec<_> = window.iter().map(|e| e.end_time).collect();

    // Boundary-exact at the start included, at the end excluded.
    assert_eq!(
        times,
        vec![
            t0 + Duration::hours(1),
            t0 + Duration::hours(2),
            t0 + Duration::hours(3),
        ]
    );

    // Same set as filtering the full log by hand.
    let full = store.load_after_counter(0).expect("full log");
    let filtered: Vec<_> = full
        .iter()
        .filter(|e| a <= e.end_time && e.end_time < b)
        .map(|e| e.counter)
        .collect();
    assert_eq!(
        window.iter().map(|e| e.counter).collect::<Vec<_>>(),
        filtered
    );
}

#[test]
fn load_after_counter_is_strict_and_ordered() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    for i in 0..5i64 {
        store
            .append(cycle_at(t0 + Duration::minutes(i), vec![]))
            .expect("append");
    }

    let tail = store.load_after_counter(2).expect("load");
    assert_eq!(
        tail.iter().map(|e| e.counter).collect::<Vec<_>>(),
        vec![3, 4, 5]
    );
    assert!(store.load_after_counter(5).expect("load").is_empty());
}

#[test]
fn edit_material_remaps_every_reference_atomically() {
    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let mut referencing = Vec::new();
    for i in 0..8i64 {
        let material = if i % 2 == 0 { vec![mat(7)] } else { vec![mat(9)] };
        let entry = store
            .append(cycle_at(t0 + Duration::minutes(i), material))
            .expect("append");
        if i % 2 == 0 {
            referencing.push(entry.counter);
        }
    }

    let updated = store.edit_material(7, 700).expect("edit");
    assert_eq!(updated, referencing.len());

    let full = store.load_after_counter(0).expect("load");
    let still_old: Vec<_> = full
        .iter()
        .filter(|e| e.material.iter().any(|m| m.material_id == 7))
        .collect();
    assert!(still_old.is_empty());

    let now_new: Vec<_> = full
        .iter()
        .filter(|e| e.material.iter().any(|m| m.material_id == 700))
        .map(|e| e.counter)
        .collect();
    assert_eq!(now_new, referencing);

    // Entries referencing neither are unchanged.
    let untouched: Vec<_> = full
        .iter()
        .filter(|e| e.material.iter().any(|m| m.material_id == 9))
        .collect();
    assert_eq!(untouched.len(), 4);
}

#[test]
fn capability_traits_expose_the_store_to_collaborators() {
    use celltrace::core::backend::{AllocatorStorage, LogStorage};

    // External consumers take the capability trait, not the concrete store.
    fn catch_up(log: &dyn LogStorage, last_seen: i64) -> Vec<i64> {
        log.load_after_counter(last_seen)
            .expect("load")
            .iter()
            .map(|e| e.counter)
            .collect()
    }

    let tmp = TempDir::new().expect("tempdir");
    let store = open_store(&tmp);
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let allocator: &dyn AllocatorStorage = &store;
    let batch = allocator.allocate("P1", 1, t0, "W1", 1).expect("allocate");

    store
        .append(cycle_at(t0, vec![mat(batch[0].material_id)]))
        .expect("append");
    store
        .append(cycle_at(t0 + Duration::minutes(1), vec![]))
        .expect("append");

    assert_eq!(catch_up(&store, 0), vec![1, 2]);
    assert_eq!(catch_up(&store, 1), vec![2]);
}

#[test]
fn concurrent_appends_yield_unique_gapless_counters() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Arc::new(open_store(&tmp));
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    const THREADS: usize = 6;
    const PER_THREAD: usize = 10;

    let mut counters = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    let mut mine = Vec::new();
                    for i in 0..PER_THREAD {
                        let end = t0 + Duration::seconds((t * PER_THREAD + i) as i64);
                        mine.push(store.append(cycle_at(end, vec![])).expect("append").counter);
                    }
                    mine
                })
            })
            .collect();
        for h in handles {
            counters.extend(h.join().expect("thread"));
        }
    });

    let total = THREADS * PER_THREAD;
    counters.sort_unstable();
    assert_eq!(counters, (1..=total as i64).collect::<Vec<_>>());
}
