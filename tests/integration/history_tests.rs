//! Ring-log history through the application service: snapshot cadence,
//! eviction, clear, restore and self-healing.

use aqualevel::adapters::fs_store::MemStore;
use aqualevel::app::commands::AppCommand;
use aqualevel::app::events::AppEvent;
use aqualevel::app::ports::RecordFileStore;
use aqualevel::app::service::AppService;
use aqualevel::storage::ring::RingLog;
use aqualevel::storage::{
    LogKind, RingRecord, RECENT_CAPACITY, RECENT_PATH, RECENT_TMP_PATH,
};

use crate::mock_hw::{sim_cycle, MockClock, RecordingSink};

const T0: u32 = 1_700_000_000;

fn measure_once(
    svc: &mut AppService,
    cycle: &mut aqualevel::sensors::MeasurementCycle<
        crate::mock_hw::SimTransducer,
        crate::mock_hw::SimProbe,
    >,
    clock: &MockClock,
    sink: &mut RecordingSink,
) {
    assert!(svc.begin_measurement(cycle));
    for _ in 0..100 {
        if svc.poll_measurement(cycle, clock, sink).is_some() {
            return;
        }
    }
    panic!("measurement cycle never completed");
}

#[test]
fn minute_snapshots_fill_ring_then_evict_oldest() {
    let mut svc = AppService::new(crate::mock_hw::tank_config());
    let (mut cycle, _tank) = sim_cycle(50.0);
    let clock = MockClock::synced_at(T0);
    let mut store = MemStore::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut store, &mut sink);

    let rounds = u32::from(RECENT_CAPACITY) + 3;
    for _ in 0..rounds {
        measure_once(&mut svc, &mut cycle, &clock, &mut sink);
        svc.snapshot(LogKind::Recent, &mut store, &mut sink);
        clock.advance_secs(60);
    }

    let ring = RingLog::new(RECENT_PATH, RECENT_CAPACITY);
    assert_eq!(ring.count(&mut store), RECENT_CAPACITY);
    let latest = ring.read_latest(&mut store, RECENT_CAPACITY as usize);
    assert_eq!(latest.len(), RECENT_CAPACITY as usize);
    // Newest first; the three oldest snapshots were evicted.
    assert_eq!(latest[0].ts, T0 + (rounds - 1) * 60);
    assert_eq!(latest.last().unwrap().ts, T0 + 3 * 60);
}

#[test]
fn snapshot_before_any_measurement_is_dropped() {
    let mut svc = AppService::new(crate::mock_hw::tank_config());
    let mut store = MemStore::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut store, &mut sink);

    svc.snapshot(LogKind::Recent, &mut store, &mut sink);
    assert!(!sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::SnapshotStored { .. })));
}

#[test]
fn clear_history_command_empties_both_logs() {
    let mut svc = AppService::new(crate::mock_hw::tank_config());
    let (mut cycle, _tank) = sim_cycle(50.0);
    let clock = MockClock::synced_at(T0);
    let mut store = MemStore::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut store, &mut sink);

    measure_once(&mut svc, &mut cycle, &clock, &mut sink);
    svc.snapshot(LogKind::Recent, &mut store, &mut sink);
    svc.snapshot(LogKind::Hourly, &mut store, &mut sink);

    svc.handle_command(AppCommand::ClearHistory, &mut cycle, &mut store, &mut sink);

    let ring = RingLog::new(RECENT_PATH, RECENT_CAPACITY);
    assert_eq!(ring.count(&mut store), 0);
    assert!(sink.events.iter().any(|e| matches!(e, AppEvent::HistoryCleared)));
}

#[test]
fn restore_command_adopts_staged_upload() {
    let mut svc = AppService::new(crate::mock_hw::tank_config());
    let (mut cycle, _tank) = sim_cycle(50.0);
    let mut store = MemStore::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut store, &mut sink);

    // A backup uploaded out of band lands at the staging path.
    let donor = RingLog::new(RECENT_TMP_PATH, RECENT_CAPACITY);
    donor.init(&mut store);
    for ts in [T0, T0 + 60, T0 + 120] {
        donor.append(
            &mut store,
            &RingRecord {
                ts,
                level_pct: 40.0,
                volume_l: 120.0,
                temp_c: None,
            },
        );
    }

    svc.handle_command(
        AppCommand::RestoreHistory(LogKind::Recent),
        &mut cycle,
        &mut store,
        &mut sink,
    );

    assert!(sink.events.iter().any(
        |e| matches!(e, AppEvent::HistoryRestored { log: LogKind::Recent, count: 3 })
    ));
    let ring = RingLog::new(RECENT_PATH, RECENT_CAPACITY);
    assert_eq!(ring.read_latest(&mut store, 1)[0].ts, T0 + 120);
    assert!(!store.exists(RECENT_TMP_PATH));
}

#[test]
fn truncated_log_heals_and_keeps_snapshotting() {
    let mut svc = AppService::new(crate::mock_hw::tank_config());
    let (mut cycle, _tank) = sim_cycle(50.0);
    let clock = MockClock::synced_at(T0);
    let mut store = MemStore::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut store, &mut sink);

    measure_once(&mut svc, &mut cycle, &clock, &mut sink);
    svc.snapshot(LogKind::Recent, &mut store, &mut sink);

    // Torn flash write: the file loses its tail.
    store.truncate_for_test(RECENT_PATH, 10);

    clock.advance_secs(60);
    measure_once(&mut svc, &mut cycle, &clock, &mut sink);
    svc.snapshot(LogKind::Recent, &mut store, &mut sink);

    // The store was recreated blank and the new snapshot landed.
    let ring = RingLog::new(RECENT_PATH, RECENT_CAPACITY);
    assert_eq!(ring.count(&mut store), 1);
    assert_eq!(ring.read_latest(&mut store, 1)[0].ts, T0 + 60);
}
