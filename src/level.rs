//! Level model — distance to percentage/volume derivation with EMA smoothing.
//!
//! Owns the single piece of cross-cycle measurement state: the smoothed
//! distance. The smoothing state is an explicit field (not a static) so
//! tests can run independent model instances side by side.

use core::f32::consts::PI;

use crate::config::Calibration;

/// One measurement outcome. Immutable after the cycle that produced it.
///
/// `valid == false` means the transducer gave no usable echo this cycle;
/// the derived fields then reflect the *last known* smoothed distance so
/// consumers can distinguish "stale but plausible" from "fresh".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    /// Raw (smoothed) distance, cm.
    pub distance_cm: f32,
    /// Whether this cycle produced a fresh echo.
    pub valid: bool,
    /// Fill level, 0-100 %.
    pub level_pct: f32,
    /// Current volume, L (0 if diameter unknown).
    pub volume_l: f32,
    /// Free space, L.
    pub free_l: f32,
    /// Total tank volume, L.
    pub total_l: f32,
    /// DS18B20 temperature, degC (`None` = no probe / unavailable).
    pub temperature_c: Option<f32>,
    /// Unix time of the reading (0 = clock not yet synced).
    pub timestamp: u32,
}

/// Pure derivation of level/volume figures from a distance.
///
/// Returns all-zero outputs when the calibration range is inverted
/// (`empty <= full`) — misconfiguration degrades, it never panics.
pub fn derive(cal: &Calibration, distance_cm: f32) -> (f32, f32, f32, f32) {
    let range = cal.empty_dist_cm - cal.full_dist_cm;
    if range <= 0.0 || distance_cm <= 0.0 {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let pct = ((cal.empty_dist_cm - distance_cm) / range * 100.0).clamp(0.0, 100.0);

    if cal.diameter_cm > 0.0 {
        let r = cal.diameter_cm / 2.0;
        // cm^3 -> L
        let total = PI * r * r * range / 1000.0;
        let volume = total * pct / 100.0;
        (pct, volume, total - volume, total)
    } else {
        (pct, 0.0, 0.0, 0.0)
    }
}

/// Converts filtered distances into [`Reading`]s, smoothing across cycles.
#[derive(Debug, Default)]
pub struct LevelModel {
    /// Last smoothed distance; `None` until the first valid sample.
    smoothed_cm: Option<f32>,
}

impl LevelModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last smoothed distance, if any sample has ever been accepted.
    pub fn smoothed_cm(&self) -> Option<f32> {
        self.smoothed_cm
    }

    /// Fold one cycle's filtered distance into the model and derive a
    /// partial [`Reading`] (timestamp and temperature are stamped by the
    /// measurement cycle).
    ///
    /// An invalid distance does not discard the estimate: the reading is
    /// recomputed from the last smoothed value and flagged `valid = false`.
    pub fn update(&mut self, distance_cm: Option<f32>, cal: &Calibration) -> Reading {
        let valid = distance_cm.is_some();

        if let Some(d) = distance_cm {
            let alpha = cal.ema_alpha.clamp(0.01, 1.0);
            self.smoothed_cm = Some(match self.smoothed_cm {
                // Bootstrap: the first sample initialises the state exactly.
                None => d,
                Some(s) => alpha * d + (1.0 - alpha) * s,
            });
        }

        let smoothed = self.smoothed_cm.unwrap_or(0.0);
        let (level_pct, volume_l, free_l, total_l) = derive(cal, smoothed);

        Reading {
            distance_cm: smoothed,
            valid,
            level_pct,
            volume_l,
            free_l,
            total_l,
            temperature_c: None,
            timestamp: 0,
        }
    }
}
