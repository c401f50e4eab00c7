//! End-to-end measurement flow: cycle → level model → events → alerts.

use aqualevel::alerts::AlertEdge;
use aqualevel::app::events::AppEvent;
use aqualevel::app::service::AppService;
use aqualevel::level::Reading;
use aqualevel::sensors::MeasurementCycle;

use crate::mock_hw::{sim_cycle, MockClock, RecordingSink, SimProbe, SimTransducer};

const T0: u32 = 1_700_000_000;

fn measure(
    svc: &mut AppService,
    cycle: &mut MeasurementCycle<SimTransducer, SimProbe>,
    clock: &MockClock,
    sink: &mut RecordingSink,
) -> Reading {
    assert!(svc.begin_measurement(cycle), "cycle must be idle");
    for _ in 0..100 {
        if let Some(r) = svc.poll_measurement(cycle, clock, sink) {
            return r;
        }
    }
    panic!("measurement cycle never completed");
}

#[test]
fn full_cycle_derives_level_and_volume() {
    let mut svc = AppService::new(crate::mock_hw::tank_config());
    let (mut cycle, _tank) = sim_cycle(50.0);
    let clock = MockClock::synced_at(T0);
    let mut sink = RecordingSink::new();

    let r = measure(&mut svc, &mut cycle, &clock, &mut sink);

    assert!(r.valid);
    assert_eq!(r.timestamp, T0);
    assert!((r.distance_cm - 50.0).abs() < 0.2);
    // (110 - 50) / 85 -> 70.6 %
    assert!((r.level_pct - 70.59).abs() < 0.1);
    assert!((r.total_l - 304.2).abs() < 0.5);
    assert!((r.volume_l - 214.7).abs() < 0.5);
    assert!((r.volume_l + r.free_l - r.total_l).abs() < 0.01);
    assert_eq!(sink.readings().len(), 1);
}

#[test]
fn ema_blends_successive_distances() {
    let mut cfg = crate::mock_hw::tank_config();
    cfg.calibration.ema_alpha = 0.3;
    let mut svc = AppService::new(cfg);
    let (mut cycle, tank) = sim_cycle(50.0);
    let clock = MockClock::synced_at(T0);
    let mut sink = RecordingSink::new();

    let first = measure(&mut svc, &mut cycle, &clock, &mut sink);
    assert!((first.distance_cm - 50.0).abs() < 0.1); // bootstrap is exact

    tank.set_distance_cm(60.0);
    let second = measure(&mut svc, &mut cycle, &clock, &mut sink);
    // 0.3 * 60 + 0.7 * 50 = 53
    assert!((second.distance_cm - 53.0).abs() < 0.1);
}

#[test]
fn echo_dropout_holds_last_estimate() {
    let mut svc = AppService::new(crate::mock_hw::tank_config());
    let (mut cycle, tank) = sim_cycle(50.0);
    let clock = MockClock::synced_at(T0);
    let mut sink = RecordingSink::new();

    let good = measure(&mut svc, &mut cycle, &clock, &mut sink);

    tank.set_echo_timeout();
    let stale = measure(&mut svc, &mut cycle, &clock, &mut sink);

    assert!(!stale.valid);
    assert!((stale.level_pct - good.level_pct).abs() < 0.01);
    assert!((stale.volume_l - good.volume_l).abs() < 0.01);
    assert_eq!(svc.measure_count(), 2);
}

#[test]
fn temperature_rides_along_when_probe_enabled() {
    let mut cfg = crate::mock_hw::tank_config();
    cfg.temp_probe_enabled = true;
    let mut svc = AppService::new(cfg);
    let (mut cycle, tank) = sim_cycle(50.0);
    let clock = MockClock::synced_at(T0);
    let mut sink = RecordingSink::new();

    tank.set_temperature(Some(17.5));
    let r = measure(&mut svc, &mut cycle, &clock, &mut sink);
    assert_eq!(r.temperature_c, Some(17.5));

    // Probe unplugged mid-run: reading survives without the field.
    tank.set_temperature(None);
    let r = measure(&mut svc, &mut cycle, &clock, &mut sink);
    assert!(r.valid);
    assert_eq!(r.temperature_c, None);
}

#[test]
fn low_alert_raises_then_clears_past_recovery_band() {
    let mut cfg = crate::mock_hw::tank_config();
    cfg.alerts.enabled = true;
    cfg.alerts.low_pct = 20.0;
    let mut svc = AppService::new(cfg);
    let (mut cycle, tank) = sim_cycle(100.0); // ≈ 11.8 %
    let clock = MockClock::synced_at(T0);
    let mut sink = RecordingSink::new();

    measure(&mut svc, &mut cycle, &clock, &mut sink);
    measure(&mut svc, &mut cycle, &clock, &mut sink); // latched, no re-raise
    tank.set_distance_cm(40.0); // ≈ 82.4 %, past low + 5 band
    measure(&mut svc, &mut cycle, &clock, &mut sink);

    let edges: Vec<AlertEdge> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::AlertChanged(edge) => Some(*edge),
            _ => None,
        })
        .collect();
    assert_eq!(edges, vec![AlertEdge::LowRaised, AlertEdge::LowCleared]);
    assert_eq!(svc.alert_state(), (false, false));
}
