//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (transducer, temperature probe, flash filesystem, clock,
//! publishers, config store) implement these traits. The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the domain core never touches hardware directly.

use crate::config::DeviceConfig;
use crate::error::StorageError;

// ───────────────────────────────────────────────────────────────
// Range transducer port (driven adapter: HC-SR04 → domain)
// ───────────────────────────────────────────────────────────────

/// One pulse-echo distance transducer.
///
/// Implementations own the trigger/echo pins and the per-pulse timeout
/// (~30 ms ≈ 5 m of range). The domain never sees pin numbers or timing
/// registers, only round-trip durations.
pub trait RangeTransducer {
    /// Fire one trigger pulse and time the echo.
    /// Returns the round-trip time in microseconds, or `None` on timeout.
    fn trigger_pulse_and_measure(&mut self) -> Option<u32>;

    /// Let in-flight echoes die down between samples (~50 ms on hardware).
    /// Must yield control on cooperative targets; a no-op in mocks.
    fn settle(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Temperature probe port (optional DS18B20)
// ───────────────────────────────────────────────────────────────

/// Asynchronous temperature probe with a start/poll/read protocol.
///
/// The measurement cycle kicks off a conversion before ranging so the two
/// run concurrently, then polls [`is_ready`](Self::is_ready) under a
/// bounded deadline.
pub trait TemperatureProbe {
    /// Begin a conversion (non-blocking).
    fn request_conversion(&mut self);

    /// Whether the last requested conversion has completed.
    fn is_ready(&mut self) -> bool;

    /// Read the converted temperature. `None` = probe disconnected.
    fn read_celsius(&mut self) -> Option<f32>;
}

/// Absent probe: never ready, never returns a value.
///
/// Used when `temp_probe_enabled` is off so the cycle skips the
/// conversion wait entirely.
pub struct NoProbe;

impl TemperatureProbe for NoProbe {
    fn request_conversion(&mut self) {}

    fn is_ready(&mut self) -> bool {
        false
    }

    fn read_celsius(&mut self) -> Option<f32> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock and monotonic time source.
pub trait TimePort {
    /// Seconds since the Unix epoch. Returns 0 until SNTP has synced —
    /// consumers must treat a near-zero timestamp as "no real time yet".
    fn now_epoch(&self) -> u32;

    /// Milliseconds since boot (monotonic). Used for deadlines only.
    fn uptime_ms(&self) -> u64;

    /// Current local hour-of-day (0-23), `None` pre-sync.
    fn current_hour(&self) -> Option<u8>;
}

// ───────────────────────────────────────────────────────────────
// Flash file store port (driven adapter: domain ↔ LittleFS/VFS)
// ───────────────────────────────────────────────────────────────

/// Byte-oriented random-access file store backing the ring logs.
///
/// `write_at` may extend the file; every other structural expectation
/// (sizes, header layout) is owned by [`RingLog`](crate::storage::ring::RingLog),
/// which validates on each access and self-heals on violation.
pub trait RecordFileStore {
    fn exists(&self, path: &str) -> bool;

    fn size(&self, path: &str) -> Result<u64, StorageError>;

    /// Read exactly `buf.len()` bytes at `offset`.
    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` at `offset`, creating or extending the file as needed.
    fn write_at(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<(), StorageError>;

    fn remove(&mut self, path: &str) -> Result<(), StorageError>;

    /// Atomically replace `to` with `from` where the backend supports it.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / MQTT / bot)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, MQTT
/// topics, chat messages, web status cache).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate before persisting; a compromised network
/// channel must not be able to store a zero measurement interval or a
/// 10-million-sample burst. Loads are sanitized, not rejected: an old blob
/// with out-of-range fields is clamped into service.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`DeviceConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}
