//! Hardware port adapters.
//!
//! On the ESP32 target the port traits are implemented directly by the
//! drivers ([`HcSr04`](crate::drivers::hcsr04::HcSr04),
//! [`Ds18b20`](crate::drivers::ds18b20::Ds18b20)). This module provides
//! the host-side simulations so the whole control loop can run in tests
//! and on a developer machine.
//!
//! The sim values live in atomics so test code can steer them without
//! holding a reference to the adapter the cycle owns.

#![cfg(not(target_os = "espidf"))]

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::app::ports::{RangeTransducer, TemperatureProbe};

/// Echo round trip fed to [`SimTransducer`], µs. 0 = timeout.
static SIM_ECHO_US: AtomicU32 = AtomicU32::new(5831); // ≈100 cm

/// Probe temperature fed to [`SimProbe`], milli-degC. `i32::MIN` = absent.
static SIM_TEMP_MILLI_C: AtomicI32 = AtomicI32::new(18_000);

pub fn sim_set_echo_us(us: u32) {
    SIM_ECHO_US.store(us, Ordering::Relaxed);
}

pub fn sim_set_temp_c(celsius: Option<f32>) {
    let raw = celsius.map_or(i32::MIN, |t| (t * 1000.0) as i32);
    SIM_TEMP_MILLI_C.store(raw, Ordering::Relaxed);
}

/// Simulated pulse-echo transducer.
pub struct SimTransducer;

impl RangeTransducer for SimTransducer {
    fn trigger_pulse_and_measure(&mut self) -> Option<u32> {
        match SIM_ECHO_US.load(Ordering::Relaxed) {
            0 => None,
            us => Some(us),
        }
    }

    fn settle(&mut self) {}
}

/// Simulated temperature probe; conversions complete instantly.
pub struct SimProbe {
    converting: bool,
}

impl SimProbe {
    pub fn new() -> Self {
        Self { converting: false }
    }
}

impl Default for SimProbe {
    fn default() -> Self {
        Self::new()
    }
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
        match SIM_TEMP_MILLI_C.load(Ordering::Relaxed) {
            i32::MIN => None,
            raw => Some(raw as f32 / 1000.0),
        }
    }
}
