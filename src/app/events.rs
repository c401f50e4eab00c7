//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, publish over MQTT,
//! cache for the web status endpoint, etc.

use crate::level::Reading;
use crate::storage::LogKind;
use crate::trend::{TankEvent, TrendSnapshot};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service has started (carries the active config's
    /// measurement interval).
    Started { measure_secs: u32 },

    /// A measurement cycle completed.
    ReadingTaken(Reading),

    /// A history snapshot was appended to one of the ring logs.
    SnapshotStored { log: LogKind, count: u16 },

    /// Both ring logs were cleared on request.
    HistoryCleared,

    /// A ring log was replaced from an uploaded backup.
    HistoryRestored { log: LogKind, count: u16 },

    /// A tank event (fill/draw/leak) was detected in the minute log.
    TankEventDetected(TankEvent),

    /// An alert threshold was crossed or recovered.
    AlertChanged(crate::alerts::AlertEdge),

    /// Midnight summary of yesterday's usage.
    DailySummary {
        reading: Reading,
        trend: TrendSnapshot,
    },
}
