//! Sensor subsystem — the range sampler and the measurement cycle that
//! coordinates it with the optional temperature probe.
//!
//! A full measurement interleaves two slow operations: the DS18B20 needs
//! up to 750 ms to convert and the echo burst takes tens of milliseconds
//! per pulse. [`MeasurementCycle`] starts the conversion first, ranges
//! while it runs, then polls for the result under a short deadline so the
//! two mostly overlap instead of adding up.

pub mod range;

use log::{info, warn};

use crate::app::ports::{RangeTransducer, TemperatureProbe, TimePort};
use range::RangeSampler;

/// How long after ranging completes we keep waiting for the temperature
/// conversion before publishing the reading without it.
const TEMP_POLL_DEADLINE_MS: u64 = 250;

/// Where a cycle currently is. `Done` is transient — the next
/// [`MeasurementCycle::step`] hands out the output and returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Sampling,
    AwaitTemperature,
    Done,
}

/// Raw outputs of one completed cycle, before level derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleOutput {
    /// Median distance to the water surface; `None` if the whole burst
    /// was rejected.
    pub distance_cm: Option<f32>,
    /// Water temperature; `None` if the probe is absent, disabled or
    /// missed the deadline.
    pub temperature_c: Option<f32>,
}

/// Drives one measurement at a time through its states.
pub struct MeasurementCycle<R: RangeTransducer, P: TemperatureProbe> {
    sampler: RangeSampler<R>,
    probe: P,
    state: CycleState,
    burst: u8,
    temp_enabled: bool,
    deadline_ms: u64,
    output: CycleOutput,
}

impl<R: RangeTransducer, P: TemperatureProbe> MeasurementCycle<R, P> {
    pub fn new(sampler: RangeSampler<R>, probe: P) -> Self {
        Self {
            sampler,
            probe,
            state: CycleState::Idle,
            burst: 1,
            temp_enabled: false,
            deadline_ms: 0,
            output: CycleOutput::default(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != CycleState::Idle
    }

    /// Begin a cycle. Returns `false` (and changes nothing) if one is
    /// already in flight; callers queue the request and retry.
    pub fn start(&mut self, burst: u8, temp_enabled: bool) -> bool {
        if self.state != CycleState::Idle {
            warn!("cycle: start requested while busy, deferring");
            return false;
        }
        self.burst = burst;
        self.temp_enabled = temp_enabled;
        self.output = CycleOutput::default();
        if temp_enabled {
            // Kick the conversion off now so it runs during ranging.
            self.probe.request_conversion();
        }
        self.state = CycleState::Sampling;
        true
    }

    /// Advance the cycle. Returns the output exactly once, on the step
    /// where the cycle completes; `None` while still in flight or idle.
    pub fn step(&mut self, time: &impl TimePort) -> Option<CycleOutput> {
        match self.state {
            CycleState::Idle => None,
            CycleState::Sampling => {
                self.output.distance_cm = self.sampler.measure_cm(self.burst);
                if self.temp_enabled {
                    self.deadline_ms = time.uptime_ms() + TEMP_POLL_DEADLINE_MS;
                    self.state = CycleState::AwaitTemperature;
                } else {
                    self.state = CycleState::Done;
                }
                self.step(time)
            }
            CycleState::AwaitTemperature => {
                if self.probe.is_ready() {
                    self.output.temperature_c = self.probe.read_celsius();
                    if self.output.temperature_c.is_none() {
                        warn!("cycle: temperature probe not responding");
                    }
                    self.state = CycleState::Done;
                    self.step(time)
                } else if time.uptime_ms() >= self.deadline_ms {
                    info!("cycle: temperature conversion missed deadline, skipping");
                    self.state = CycleState::Done;
                    self.step(time)
                } else {
                    None
                }
            }
            CycleState::Done => {
                self.state = CycleState::Idle;
                Some(self.output)
            }
        }
    }
}
