//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (web API, MQTT,
//! scheduler) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.

use crate::config::DeviceConfig;
use crate::storage::LogKind;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Take a measurement immediately, outside the periodic schedule.
    MeasureNow,

    /// Erase both history ring logs.
    ClearHistory,

    /// Adopt an uploaded backup file as the named ring log.
    RestoreHistory(LogKind),

    /// Hot-reload configuration (e.g. from the web UI or MQTT).
    UpdateConfig(DeviceConfig),

    /// Explicitly persist the current config immediately.
    SaveConfig,
}
