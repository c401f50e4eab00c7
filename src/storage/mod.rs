//! Flash-backed history storage.
//!
//! Two fixed-capacity circular logs share one on-disk format (they differ
//! only in capacity and write cadence):
//!
//! ```text
//! file = header(4 bytes) + capacity * record(16 bytes)
//!   header: u16 head (next write index, LE), u16 count (valid slots, LE)
//!   record: u32 ts, f32 level_pct, f32 volume_l, f32 temp_c (NaN = absent)
//! ```
//!
//! A record with `ts == 0` is the "never written" sentinel and is skipped
//! by readers. Any structural violation (wrong file size, `head >= cap`,
//! `count > cap`) is treated as corruption and self-heals by recreating a
//! blank file — history is the one thing this device can always afford to
//! lose.

pub mod ring;

/// Header length in bytes.
pub const HEADER_LEN: usize = 4;

/// Record length in bytes.
pub const RECORD_LEN: usize = 16;

/// Hourly log capacity: 90 days at one record per hour.
pub const HOURLY_CAPACITY: u16 = 2160;

/// Recent log capacity: the last hour at one record per minute.
pub const RECENT_CAPACITY: u16 = 60;

/// Hourly log path (relative to the store root).
pub const HOURLY_PATH: &str = "hist_hourly.bin";

/// Recent log path.
pub const RECENT_PATH: &str = "hist_recent.bin";

/// Upload staging paths for backup restore.
pub const HOURLY_TMP_PATH: &str = "hist_hourly.upload.tmp";
pub const RECENT_TMP_PATH: &str = "hist_recent.upload.tmp";

/// Which of the two ring logs an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Hourly,
    Recent,
}

/// One stored history point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingRecord {
    /// Unix time; 0 = never-written sentinel.
    pub ts: u32,
    /// Fill level, %.
    pub level_pct: f32,
    /// Volume, L (0 if diameter unknown).
    pub volume_l: f32,
    /// Temperature, degC (`None` = probe absent at record time).
    pub temp_c: Option<f32>,
}

impl RingRecord {
    /// Blank sentinel slot.
    pub const fn sentinel() -> Self {
        Self {
            ts: 0,
            level_pct: 0.0,
            volume_l: 0.0,
            temp_c: None,
        }
    }

    /// Serialise into the fixed 16-byte little-endian wire format.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&self.ts.to_le_bytes());
        out[4..8].copy_from_slice(&self.level_pct.to_le_bytes());
        out[8..12].copy_from_slice(&self.volume_l.to_le_bytes());
        let temp = self.temp_c.unwrap_or(f32::NAN);
        out[12..16].copy_from_slice(&temp.to_le_bytes());
        out
    }

    /// Deserialise from the wire format. Infallible by construction —
    /// every 16-byte pattern decodes; garbage shows up as a bogus
    /// timestamp that readers reject elsewhere.
    pub fn from_bytes(raw: &[u8; RECORD_LEN]) -> Self {
        let ts = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let level_pct = f32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let volume_l = f32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
        let temp = f32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]);
        Self {
            ts,
            level_pct,
            volume_l,
            temp_c: if temp.is_nan() { None } else { Some(temp) },
        }
    }
}

/// Ring header: `head` is the next write index, `count` the number of
/// valid slots. The record write is authoritative; the header is a cache
/// of the newest valid index and may lag one append behind after a crash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingHeader {
    pub head: u16,
    pub count: u16,
}

impl RingHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&self.head.to_le_bytes());
        out[2..4].copy_from_slice(&self.count.to_le_bytes());
        out
    }

    pub fn from_bytes(raw: &[u8; HEADER_LEN]) -> Self {
        Self {
            head: u16::from_le_bytes([raw[0], raw[1]]),
            count: u16::from_le_bytes([raw[2], raw[3]]),
        }
    }

    /// Structural invariants for a ring of the given capacity.
    pub fn valid_for(&self, capacity: u16) -> bool {
        self.head < capacity && self.count <= capacity
    }
}

/// Expected file size for a ring of the given capacity.
pub fn file_len(capacity: u16) -> u64 {
    (HEADER_LEN + capacity as usize * RECORD_LEN) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_wire_format_is_16_bytes_le() {
        let rec = RingRecord {
            ts: 0x0102_0304,
            level_pct: 50.0,
            volume_l: 86.9,
            temp_c: Some(18.5),
        };
        let raw = rec.to_bytes();
        assert_eq!(raw[0..4], [0x04, 0x03, 0x02, 0x01]);
        let back = RingRecord::from_bytes(&raw);
        assert_eq!(back.ts, rec.ts);
        assert!((back.level_pct - 50.0).abs() < f32::EPSILON);
        assert_eq!(back.temp_c, Some(18.5));
    }

    #[test]
    fn absent_temperature_encodes_as_nan() {
        let raw = RingRecord::sentinel().to_bytes();
        let temp = f32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]);
        assert!(temp.is_nan());
        assert_eq!(RingRecord::from_bytes(&raw).temp_c, None);
    }

    #[test]
    fn header_invariants() {
        assert!(RingHeader { head: 0, count: 0 }.valid_for(60));
        assert!(RingHeader { head: 59, count: 60 }.valid_for(60));
        assert!(!RingHeader { head: 60, count: 0 }.valid_for(60));
        assert!(!RingHeader { head: 0, count: 61 }.valid_for(60));
    }

    #[test]
    fn file_len_matches_layout() {
        assert_eq!(file_len(60), 4 + 60 * 16);
        assert_eq!(file_len(HOURLY_CAPACITY), 4 + 2160 * 16);
    }
}
