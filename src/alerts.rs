//! Level alert monitoring with hysteresis.
//!
//! Alerts latch when the level crosses a threshold and only clear once it
//! has moved a recovery band past it, so a surface sloshing around the
//! threshold produces one notification instead of a storm.

use heapless::Vec;
use log::info;

use crate::config::AlertConfig;

/// How far past the threshold the level must recover before an alert
/// clears, in percentage points.
const RECOVERY_BAND_PCT: f32 = 5.0;

const DAY_SECS: u32 = 86400;

/// State transitions produced by one [`AlertMonitor::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEdge {
    LowRaised,
    LowCleared,
    HighRaised,
    HighCleared,
}

/// Tracks latched alert state across readings.
#[derive(Debug, Default)]
pub struct AlertMonitor {
    low_active: bool,
    high_active: bool,
    last_summary_day: Option<u32>,
}

impl AlertMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn low_active(&self) -> bool {
        self.low_active
    }

    pub fn high_active(&self) -> bool {
        self.high_active
    }

    /// Evaluate a new level reading against the thresholds.
    ///
    /// Returns only the edges, never the steady states; both can fire in
    /// one call after a config change moves the thresholds.
    pub fn check(&mut self, level_pct: f32, cfg: &AlertConfig) -> Vec<AlertEdge, 2> {
        let mut edges: Vec<AlertEdge, 2> = Vec::new();

        if !cfg.enabled {
            // Disabling mid-alert drops the latch quietly.
            self.low_active = false;
            self.high_active = false;
            return edges;
        }

        if !self.low_active && level_pct <= cfg.low_pct {
            self.low_active = true;
            info!("alert: low level, {:.1}% <= {:.1}%", level_pct, cfg.low_pct);
            let _ = edges.push(AlertEdge::LowRaised);
        } else if self.low_active && level_pct >= cfg.low_pct + RECOVERY_BAND_PCT {
            self.low_active = false;
            info!("alert: low level cleared at {:.1}%", level_pct);
            let _ = edges.push(AlertEdge::LowCleared);
        }

        if !self.high_active && level_pct >= cfg.high_pct {
            self.high_active = true;
            info!(
                "alert: high level, {:.1}% >= {:.1}%",
                level_pct, cfg.high_pct
            );
            let _ = edges.push(AlertEdge::HighRaised);
        } else if self.high_active && level_pct <= cfg.high_pct - RECOVERY_BAND_PCT {
            self.high_active = false;
            info!("alert: high level cleared at {:.1}%", level_pct);
            let _ = edges.push(AlertEdge::HighCleared);
        }

        edges
    }

    /// Whether the daily summary should fire now.
    ///
    /// Fires at most once per calendar day, in the midnight hour. A device
    /// that was asleep or offline at midnight simply skips that day.
    pub fn daily_summary_due(&mut self, now_epoch: u32, hour: Option<u8>, cfg: &AlertConfig) -> bool {
        if !cfg.daily_summary || now_epoch == 0 || hour != Some(0) {
            return false;
        }
        let day = now_epoch / DAY_SECS;
        if self.last_summary_day == Some(day) {
            return false;
        }
        self.last_summary_day = Some(day);
        true
    }
}
