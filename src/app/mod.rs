//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the AquaLevel monitor:
//! measurement orchestration, history snapshots, trend analytics, and
//! alerting. All interaction with hardware, flash, and the network happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
