//! System time adapter.
//!
//! Implements [`TimePort`] for the AquaLevel monitor.
//!
//! - **`target_os = "espidf"`** — monotonic time from
//!   `esp_timer_get_time()`, wall clock from `gettimeofday()` (valid once
//!   SNTP has synced).
//! - **`not(target_os = "espidf")`** — `std::time` for host-side testing
//!   and simulation.

use crate::app::ports::TimePort;

/// Wall clocks earlier than 2020-01-01 are unsynced boot defaults.
const EPOCH_2020: i64 = 1_577_836_800;

pub struct SystemTimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemTimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemTimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn wall_secs() -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = i64::from(tv.tv_sec as i32);
        (secs >= EPOCH_2020).then_some(secs)
    }

    #[cfg(not(target_os = "espidf"))]
    fn wall_secs() -> Option<i64> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs() as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }
}

impl TimePort for SystemTimeAdapter {
    fn now_epoch(&self) -> u32 {
        match Self::wall_secs() {
            Some(secs) => secs as u32,
            None => 0,
        }
    }

    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn current_hour(&self) -> Option<u8> {
        let secs = Self::wall_secs()? as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        u8::try_from(tm.tm_hour).ok().filter(|h| *h < 24)
    }

    /// UTC hour on the host; the simulation has no timezone database.
    #[cfg(not(target_os = "espidf"))]
    fn current_hour(&self) -> Option<u8> {
        let secs = Self::wall_secs()?;
        Some(((secs % 86_400) / 3_600) as u8)
    }
}
