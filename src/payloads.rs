//! JSON payload builders for the web status endpoint and MQTT.
//!
//! Floats are rounded to one decimal before serialisation; the consumers
//! are dashboards, and shipping `11.764706` over a 15-second MQTT cadence
//! is wire noise. Fields that are genuinely absent (no probe, no trend
//! data yet) are omitted rather than sent as null.

use serde::Serialize;

use crate::level::Reading;
use crate::trend::{TankEvent, TrendSnapshot};

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Full device status, served by `/api/status` and the MQTT `/json` topic.
#[derive(Debug, Serialize)]
pub struct StatusPayload {
    pub device: heapless::String<32>,
    pub valid: bool,
    pub distance_cm: f32,
    pub level_pct: f32,
    pub volume_l: f32,
    pub free_l: f32,
    pub total_l: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
    pub timestamp: u32,
    pub alert_low: bool,
    pub alert_high: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendPayload>,
}

/// Trend block nested in the status payload. Present only once the
/// engine has enough history to say anything.
#[derive(Debug, Serialize)]
pub struct TrendPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_24h_l: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_7d_l: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_24h_lpd: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_7d_lpd: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_empty_ts: Option<u32>,
}

/// One detected event, as served by `/api/events`.
#[derive(Debug, Serialize)]
pub struct EventPayload {
    pub ts: u32,
    pub kind: &'static str,
    pub delta_l: f32,
    pub rate_lph: f32,
}

pub fn status_payload(
    device: &heapless::String<32>,
    reading: &Reading,
    trend: &TrendSnapshot,
    alert_low: bool,
    alert_high: bool,
) -> StatusPayload {
    StatusPayload {
        device: device.clone(),
        valid: reading.valid,
        distance_cm: round1(reading.distance_cm),
        level_pct: round1(reading.level_pct),
        volume_l: round1(reading.volume_l),
        free_l: round1(reading.free_l),
        total_l: round1(reading.total_l),
        temperature_c: reading.temperature_c.map(round1),
        timestamp: reading.timestamp,
        alert_low,
        alert_high,
        trend: trend.ok.then(|| TrendPayload {
            used_24h_l: trend.used_24h_l,
            used_7d_l: trend.used_7d_l,
            rate_24h_lpd: trend.rate_24h_lpd,
            rate_7d_lpd: trend.rate_7d_lpd,
            days_left: trend.days_left,
            eta_empty_ts: trend.eta_empty_ts,
        }),
    }
}

pub fn events_payload(events: &[TankEvent]) -> Vec<EventPayload> {
    events
        .iter()
        .map(|e| EventPayload {
            ts: e.ts,
            kind: e.kind.as_str(),
            delta_l: round1(e.delta_l),
            rate_lph: round1(e.rate_lph),
        })
        .collect()
}
