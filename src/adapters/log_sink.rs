//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! The MQTT adapter implements the same trait for the network side.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ReadingTaken(r) => {
                info!(
                    "READ  | d={:.1}cm level={:.1}% vol={:.1}L free={:.1}L temp={} valid={}",
                    r.distance_cm,
                    r.level_pct,
                    r.volume_l,
                    r.free_l,
                    r.temperature_c
                        .map_or_else(|| "n/a".into(), |t| format!("{t:.1}C")),
                    r.valid,
                );
            }
            AppEvent::SnapshotStored { log, count } => {
                info!("HIST  | {:?} log now holds {} records", log, count);
            }
            AppEvent::HistoryCleared => {
                info!("HIST  | cleared both logs");
            }
            AppEvent::HistoryRestored { log, count } => {
                info!("HIST  | {:?} log restored from upload ({} records)", log, count);
            }
            AppEvent::TankEventDetected(ev) => {
                info!(
                    "EVENT | {} dv={:+.1}L rate={:+.1}L/h at {}",
                    ev.kind.as_str(),
                    ev.delta_l,
                    ev.rate_lph,
                    ev.ts
                );
            }
            AppEvent::AlertChanged(edge) => {
                warn!("ALERT | {:?}", edge);
            }
            AppEvent::DailySummary { reading, trend } => {
                info!(
                    "DAILY | level={:.1}% vol={:.1}L used24h={:?}L days_left={:?}",
                    reading.level_pct, reading.volume_l, trend.used_24h_l, trend.days_left,
                );
            }
            AppEvent::Started { measure_secs } => {
                info!("START | measuring every {} s", measure_secs);
            }
        }
    }
}
