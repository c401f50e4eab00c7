//! Mock port implementations for integration tests.
//!
//! The sensor mocks hand out shared steering handles so a test can change
//! tank conditions between measurements while the cycle owns the adapter.

use std::cell::Cell;
use std::rc::Rc;

use aqualevel::app::events::AppEvent;
use aqualevel::app::ports::{
    EventSink, RangeTransducer, TemperatureProbe, TimePort,
};
use aqualevel::config::DeviceConfig;
use aqualevel::level::Reading;
use aqualevel::sensors::range::RangeSampler;
use aqualevel::sensors::MeasurementCycle;

/// Round-trip echo time for a surface at `distance_cm`.
pub fn echo_us(distance_cm: f32) -> u32 {
    (distance_cm / 0.017_15).round() as u32
}

// ── Tank simulation ───────────────────────────────────────────

/// Shared handle steering the simulated tank between measurements.
#[derive(Clone)]
pub struct TankHandle {
    echo: Rc<Cell<Option<u32>>>,
    temp: Rc<Cell<Option<f32>>>,
}

#[allow(dead_code)]
impl TankHandle {
    pub fn set_distance_cm(&self, d: f32) {
        self.echo.set(Some(echo_us(d)));
    }

    pub fn set_echo_timeout(&self) {
        self.echo.set(None);
    }

    pub fn set_temperature(&self, celsius: Option<f32>) {
        self.temp.set(celsius);
    }
}

/// Transducer returning whatever the handle currently says.
pub struct SimTransducer {
    echo: Rc<Cell<Option<u32>>>,
}

impl RangeTransducer for SimTransducer {
    fn trigger_pulse_and_measure(&mut self) -> Option<u32> {
        self.echo.get()
    }

    fn settle(&mut self) {}
}

/// Probe with instant conversions, fed from the handle.
pub struct SimProbe {
    temp: Rc<Cell<Option<f32>>>,
    converting: bool,
}

impl TemperatureProbe for SimProbe {
    fn request_conversion(&mut self) {
        self.converting = true;
    }

    fn is_ready(&mut self) -> bool {
        self.converting
    }

    fn read_celsius(&mut self) -> Option<f32> {
        if !self.converting {
            return None;
        }
        self.converting = false;
        self.temp.get()
    }
}

/// A measurement cycle over the simulated tank, plus its steering handle.
pub fn sim_cycle(distance_cm: f32) -> (MeasurementCycle<SimTransducer, SimProbe>, TankHandle) {
    let handle = TankHandle {
        echo: Rc::new(Cell::new(Some(echo_us(distance_cm)))),
        temp: Rc::new(Cell::new(Some(17.5))),
    };
    let cycle = MeasurementCycle::new(
        RangeSampler::new(SimTransducer {
            echo: handle.echo.clone(),
        }),
        SimProbe {
            temp: handle.temp.clone(),
            converting: false,
        },
    );
    (cycle, handle)
}

// ── Clock ─────────────────────────────────────────────────────

pub struct MockClock {
    epoch: Cell<u32>,
    uptime_ms: Cell<u64>,
    hour: Cell<Option<u8>>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn synced_at(epoch: u32) -> Self {
        Self {
            epoch: Cell::new(epoch),
            uptime_ms: Cell::new(60_000),
            hour: Cell::new(Some(12)),
        }
    }

    pub fn advance_secs(&self, secs: u32) {
        self.epoch.set(self.epoch.get() + secs);
        self.uptime_ms
            .set(self.uptime_ms.get() + u64::from(secs) * 1000);
    }

    pub fn set_hour(&self, hour: Option<u8>) {
        self.hour.set(hour);
    }
}

impl TimePort for MockClock {
    fn now_epoch(&self) -> u32 {
        self.epoch.get()
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime_ms.get()
    }

    fn current_hour(&self) -> Option<u8> {
        self.hour.get()
    }
}

// ── Event recording ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ReadingTaken(r) => Some(*r),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Config ────────────────────────────────────────────────────

/// 67.5 cm barrel, empty at 110 cm, full at 25 cm, no smoothing.
/// Total volume ≈ 304.2 L; 1 cm of height ≈ 3.58 L.
#[allow(dead_code)]
pub fn tank_config() -> DeviceConfig {
    let mut cfg = DeviceConfig::default();
    cfg.calibration.empty_dist_cm = 110.0;
    cfg.calibration.full_dist_cm = 25.0;
    cfg.calibration.diameter_cm = 67.5;
    cfg.calibration.ema_alpha = 1.0;
    cfg.calibration.avg_samples = 3;
    cfg
}
