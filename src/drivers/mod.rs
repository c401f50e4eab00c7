//! Hardware drivers for the ESP32 target.
//!
//! Everything in here talks to real peripherals and is gated on
//! `target_os = "espidf"` where it cannot run on the host. The pure
//! helpers (CRC, temperature decoding) stay host-testable.

#[cfg(target_os = "espidf")]
pub mod hcsr04;
#[cfg(target_os = "espidf")]
pub mod timers;

pub mod ds18b20;
pub mod watchdog;
