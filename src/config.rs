//! System configuration parameters
//!
//! All tunable parameters for the AquaLevel monitor.
//! Values can be overridden via NVS (non-volatile storage) or the
//! configuration API exposed by the web layer.

use serde::{Deserialize, Serialize};

/// Tank geometry and sampling calibration.
///
/// `empty_dist_cm` is the sensor-to-bottom distance (tank empty),
/// `full_dist_cm` the sensor-to-surface distance when full. A diameter of
/// zero means "unknown" and collapses all volume outputs to zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Calibration {
    /// Distance when the tank is EMPTY (sensor to bottom), cm.
    pub empty_dist_cm: f32,
    /// Distance when the tank is FULL (sensor to water), cm.
    pub full_dist_cm: f32,
    /// Inner tank diameter, cm (0 = unknown).
    pub diameter_cm: f32,
    /// Pulse-echo readings per measurement cycle (1-30).
    pub avg_samples: u8,
    /// EMA smoothing factor applied across cycles (0.01-1.0).
    pub ema_alpha: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            empty_dist_cm: 100.0,
            full_dist_cm: 5.0,
            diameter_cm: 0.0,
            avg_samples: 5,
            ema_alpha: 0.3,
        }
    }
}

impl Calibration {
    /// Clamp sampling parameters into their operating ranges.
    ///
    /// Geometry fields are left untouched: an inverted `empty`/`full` pair
    /// degrades to zero-valued outputs downstream instead of being guessed
    /// at here.
    pub fn sanitized(mut self) -> Self {
        self.avg_samples = self.avg_samples.clamp(1, 30);
        self.ema_alpha = self.ema_alpha.clamp(0.01, 1.0);
        self
    }
}

/// Detection thresholds for discrete fill/draw/leak events.
///
/// Hand-tuned for a noisy ~200 L barrel; other tank geometries will want
/// different values, which is why these are configuration and not constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventThresholds {
    /// Volume increase (L) classified as a refill.
    pub fill_l: f32,
    /// Volume decrease (L) classified as a manual draw.
    pub draw_l: f32,
    /// Volume decrease (L) that, combined with `leak_rate_lph`, flags a leak.
    pub leak_l: f32,
    /// Sustained loss rate (L/h) below which a decrease is a leak.
    pub leak_rate_lph: f32,
}

impl Default for EventThresholds {
    fn default() -> Self {
        Self {
            fill_l: 6.0,
            draw_l: -6.0,
            leak_l: -4.0,
            leak_rate_lph: -18.0,
        }
    }
}

/// MQTT publisher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: heapless::String<64>,
    pub port: u16,
    pub username: heapless::String<32>,
    pub password: heapless::String<32>,
    /// Base topic; `/level`, `/distance`, `/volume`, `/free`, `/json` are
    /// published beneath it.
    pub base_topic: heapless::String<64>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: heapless::String::try_from("mqtt.local").unwrap_or_default(),
            port: 1883,
            username: heapless::String::new(),
            password: heapless::String::new(),
            base_topic: heapless::String::try_from("aqualevel").unwrap_or_default(),
        }
    }
}

/// Level alert settings (low/high thresholds, daily summary).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlertConfig {
    pub enabled: bool,
    /// Alert when level falls below this percentage.
    pub low_pct: f32,
    /// Alert when level rises above this percentage.
    pub high_pct: f32,
    /// Send a daily summary at midnight.
    pub daily_summary: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            low_pct: 20.0,
            high_pct: 95.0,
            daily_summary: false,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hostname / MQTT client id.
    pub device_name: heapless::String<32>,

    // --- Measurement ---
    pub calibration: Calibration,
    /// Seconds between measurement cycles.
    pub measure_secs: u16,
    /// Whether a DS18B20 probe is wired.
    pub temp_probe_enabled: bool,

    // --- Publishers / alerting ---
    pub mqtt: MqttConfig,
    pub alerts: AlertConfig,

    // --- Analytics ---
    pub events: EventThresholds,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: heapless::String::try_from("aqualevel").unwrap_or_default(),
            calibration: Calibration::default(),
            measure_secs: 60,
            temp_probe_enabled: false,
            mqtt: MqttConfig::default(),
            alerts: AlertConfig::default(),
            events: EventThresholds::default(),
        }
    }
}

impl DeviceConfig {
    /// Return a copy with every field forced into its operating range.
    ///
    /// Applied on every load: a config blob written by an older firmware
    /// (or a hand-edited backup) must never push out-of-range values into
    /// the measurement core.
    pub fn sanitized(mut self) -> Self {
        self.calibration = self.calibration.sanitized();
        self.measure_secs = self.measure_secs.max(5);
        self.alerts.low_pct = self.alerts.low_pct.clamp(0.0, 100.0);
        self.alerts.high_pct = self.alerts.high_pct.clamp(0.0, 100.0);
        self
    }
}
