//! Consumption trend analytics derived from the two ring logs.
//!
//! The engine is a pure function of "last reading + log contents" with an
//! explicit memo keyed on the reading timestamp, so a web layer polling
//! `/api/status` every few seconds does not rescan 2160 flash records per
//! request. Event detection over the minute-resolution log is a separate
//! pass with its own (configurable) thresholds.

use log::debug;

use crate::config::EventThresholds;
use crate::level::Reading;
use crate::storage::{RingRecord, RECENT_CAPACITY};

/// Maximum retained events; oldest is evicted on overflow.
pub const MAX_EVENTS: usize = 8;

const DAY_SECS: u32 = 24 * 3600;
const WEEK_SECS: u32 = 7 * DAY_SECS;
const HOUR_SECS: u32 = 3600;

/// Pairs further apart than this are reboot gaps / manual edits, not usage.
const MAX_PAIR_GAP_SECS: u32 = 6 * 3600;

/// Pairs closer than this are duplicate writes, not usage.
const MIN_PAIR_GAP_SECS: u32 = 30;

/// Volume deltas shallower than this are measurement noise.
const NOISE_FLOOR_L: f32 = 0.3;

/// Minimum believable consumption rate, L/day.
const MIN_RATE_LPD: f32 = 0.2;

/// Derived usage statistics over the 24 h and 7 d windows. Ephemeral —
/// never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrendSnapshot {
    /// Preconditions held (synced clock, known capacity).
    pub ok: bool,
    pub used_24h_l: Option<f32>,
    pub used_7d_l: Option<f32>,
    pub rate_24h_lpd: Option<f32>,
    pub rate_7d_lpd: Option<f32>,
    pub span_24h_s: u32,
    pub span_7d_s: u32,
    pub days_left: Option<f32>,
    pub eta_empty_ts: Option<u32>,
}

/// Discrete change detected in the minute-resolution log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankEvent {
    pub ts: u32,
    pub kind: EventKind,
    pub delta_l: f32,
    pub rate_lph: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Fill,
    Draw,
    Leak,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Draw => "draw",
            Self::Leak => "leak",
        }
    }
}

/// Computes and memoizes [`TrendSnapshot`]s.
#[derive(Debug, Default)]
pub struct TrendEngine {
    cache: Option<(u32, TrendSnapshot)>,
}

impl TrendEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the memo (called after a history restore or clear).
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Compute the trend for `reading` from the log contents.
    ///
    /// `hourly` and `recent` are newest-first, as returned by
    /// [`RingLog::read_latest`](crate::storage::ring::RingLog::read_latest).
    /// Within the last hour the minute log entirely supersedes the hourly
    /// log, so overlapping hourly entries are skipped to avoid counting the
    /// same water twice at different resolutions.
    pub fn compute(
        &mut self,
        reading: &Reading,
        hourly: &[RingRecord],
        recent: &[RingRecord],
    ) -> TrendSnapshot {
        if let Some((ts, cached)) = self.cache {
            if ts == reading.timestamp && ts != 0 {
                return cached;
            }
        }

        let snap = compute_trend(reading, hourly, recent);
        self.cache = Some((reading.timestamp, snap));
        snap
    }
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

fn compute_trend(reading: &Reading, hourly: &[RingRecord], recent: &[RingRecord]) -> TrendSnapshot {
    let mut snap = TrendSnapshot::default();

    // Unsynced clock or unknown geometry: no estimate, by design.
    if reading.timestamp == 0 || reading.total_l <= 0.0 || reading.volume_l < 0.0 {
        return snap;
    }
    snap.ok = true;

    let now = reading.timestamp;
    let since_24h = now.saturating_sub(DAY_SECS);
    let since_7d = now.saturating_sub(WEEK_SECS);
    let recent_since = now.saturating_sub(HOUR_SECS);

    let mut prev: Option<RingRecord> = None;
    let mut window_24h: Option<(u32, u32)> = None; // (first, last)
    let mut window_7d: Option<(u32, u32)> = None;
    let mut used_24h = 0.0f32;
    let mut used_7d = 0.0f32;

    let mut feed = |rec: &RingRecord| {
        if rec.ts == 0 || rec.ts > now || rec.ts < since_7d || rec.volume_l < 0.0 {
            return;
        }

        if rec.ts >= since_24h {
            window_24h = Some(window_24h.map_or((rec.ts, rec.ts), |(f, _)| (f, rec.ts)));
        }
        window_7d = Some(window_7d.map_or((rec.ts, rec.ts), |(f, _)| (f, rec.ts)));

        if let Some(p) = prev {
            if rec.ts > p.ts && p.volume_l >= 0.0 {
                let dt = rec.ts - p.ts;
                if (MIN_PAIR_GAP_SECS..=MAX_PAIR_GAP_SECS).contains(&dt) {
                    let dv = rec.volume_l - p.volume_l; // + refill, - consumption
                    if dv < -NOISE_FLOOR_L {
                        if p.ts >= since_24h {
                            used_24h += -dv;
                        }
                        used_7d += -dv;
                    }
                }
            }
        }
        prev = Some(*rec);
    };

    // Hourly points older than the minute window, chronological.
    for rec in hourly.iter().rev() {
        if rec.ts >= recent_since {
            continue;
        }
        feed(rec);
    }
    // Minute-resolution points.
    for rec in recent.iter().rev() {
        feed(rec);
    }

    if let Some((first, last)) = window_24h {
        if last > first {
            snap.span_24h_s = last - first;
            snap.used_24h_l = Some(round1(used_24h));
            snap.rate_24h_lpd = Some(round1(used_24h * 86400.0 / snap.span_24h_s as f32));
        }
    }
    if let Some((first, last)) = window_7d {
        if last > first {
            snap.span_7d_s = last - first;
            snap.used_7d_l = Some(round1(used_7d));
            snap.rate_7d_lpd = Some(round1(used_7d * 86400.0 / snap.span_7d_s as f32));
        }
    }

    // Rate preference: 24 h window when it has enough span, else 7 d.
    let rate = match (snap.rate_24h_lpd, snap.rate_7d_lpd) {
        (Some(r), _) if snap.span_24h_s >= 6 * HOUR_SECS && r > MIN_RATE_LPD => Some(r),
        (_, Some(r)) if snap.span_7d_s >= DAY_SECS && r > MIN_RATE_LPD => Some(r),
        _ => None,
    };

    if let Some(rate) = rate {
        if reading.volume_l > 0.0 {
            let days = reading.volume_l / rate;
            snap.days_left = Some(round1(days));
            snap.eta_empty_ts = Some(now + (days * 86400.0) as u32);
        }
    }

    debug!(
        "trend: used24={:?} rate24={:?} used7d={:?} days_left={:?}",
        snap.used_24h_l, snap.rate_24h_lpd, snap.used_7d_l, snap.days_left
    );
    snap
}

/// Classify discrete fill/draw/leak events from the minute log.
///
/// `recent` is newest-first; the result is chronological (oldest first)
/// and capped at [`MAX_EVENTS`]. Records stamped at or past a newer
/// append (clock rollback leftovers) are dropped before scanning.
/// Consecutive same-kind events within 15 minutes merge into one,
/// extending the timestamp, summing the delta and keeping the steepest
/// rate.
pub fn detect_events(
    recent: &[RingRecord],
    thresholds: &EventThresholds,
) -> heapless::Vec<TankEvent, MAX_EVENTS> {
    const MAX_EVENT_GAP_SECS: u32 = 1200;
    const MERGE_WINDOW_SECS: u32 = 900;

    // Newest-first pass keeping only records strictly older than every
    // newer append. The survivors form a strictly increasing series in
    // chronological order, which the pair scan below relies on.
    let mut floor = u32::MAX;
    let mut ordered: heapless::Vec<RingRecord, { RECENT_CAPACITY as usize }> =
        heapless::Vec::new();
    for rec in recent {
        if rec.ts == 0 || rec.volume_l < 0.0 || rec.ts >= floor {
            continue;
        }
        floor = rec.ts;
        if ordered.push(*rec).is_err() {
            break;
        }
    }

    let mut events: heapless::Vec<TankEvent, MAX_EVENTS> = heapless::Vec::new();
    let mut prev: Option<RingRecord> = None;

    for rec in ordered.iter().rev() {
        let Some(p) = prev else {
            prev = Some(*rec);
            continue;
        };

        let dt = rec.ts - p.ts;
        if !(MIN_PAIR_GAP_SECS..=MAX_EVENT_GAP_SECS).contains(&dt) {
            prev = Some(*rec);
            continue;
        }

        let dv = rec.volume_l - p.volume_l;
        let rate = dv * 3600.0 / dt as f32;

        // Leak outranks draw: a steady loss at leak rate is the alarm case.
        let kind = if dv <= thresholds.leak_l && rate <= thresholds.leak_rate_lph {
            Some(EventKind::Leak)
        } else if dv >= thresholds.fill_l {
            Some(EventKind::Fill)
        } else if dv <= thresholds.draw_l {
            Some(EventKind::Draw)
        } else {
            None
        };

        if let Some(kind) = kind {
            let merged = match events.last_mut() {
                Some(last) if last.kind == kind && rec.ts - last.ts <= MERGE_WINDOW_SECS => {
                    last.ts = rec.ts;
                    last.delta_l += dv;
                    if rate.abs() > last.rate_lph.abs() {
                        last.rate_lph = rate;
                    }
                    true
                }
                _ => false,
            };
            if !merged {
                let ev = TankEvent {
                    ts: rec.ts,
                    kind,
                    delta_l: dv,
                    rate_lph: rate,
                };
                if events.is_full() {
                    events.remove(0); // evict oldest
                }
                let _ = events.push(ev);
            }
        }
        prev = Some(*rec);
    }
    events
}
