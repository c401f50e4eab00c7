//! Cadence timers using ESP-IDF's esp_timer API.
//!
//! Creates the periodic timers that push events into the lock-free SPSC
//! queue: measurement, minute/hourly snapshots, publish and the watchdog
//! heartbeat. Callbacks execute in the ESP timer task context (not ISR),
//! so they can safely call `push_event()`.

use esp_idf_svc::sys::*;
use log::{error, info};

use crate::events::{push_event, Event};

static mut MEASURE_TIMER: esp_timer_handle_t = core::ptr::null_mut();
static mut MINUTE_TIMER: esp_timer_handle_t = core::ptr::null_mut();
static mut HOURLY_TIMER: esp_timer_handle_t = core::ptr::null_mut();
static mut PUBLISH_TIMER: esp_timer_handle_t = core::ptr::null_mut();
static mut WATCHDOG_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// Recent-log snapshot cadence, µs.
const MINUTE_PERIOD_US: u64 = 60 * 1_000_000;

/// Hourly-log snapshot cadence, µs.
const HOURLY_PERIOD_US: u64 = 3600 * 1_000_000;

/// Retained status refresh + daily-summary check cadence, µs.
const PUBLISH_PERIOD_US: u64 = 60 * 1_000_000;

/// Watchdog heartbeat cadence, µs. Feeds flow through the event queue so
/// a wedged consumer loop trips the TWDT instead of being papered over.
const WATCHDOG_PERIOD_US: u64 = 2 * 1_000_000;

unsafe extern "C" fn measure_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::MeasureTick);
}

unsafe extern "C" fn minute_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::MinuteSnapshotDue);
}

unsafe extern "C" fn hourly_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::HourlySnapshotDue);
}

unsafe extern "C" fn publish_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::PublishTick);
    push_event(Event::DailySummaryCheck);
}

unsafe extern "C" fn watchdog_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::WatchdogTick);
}

/// SAFETY: `handle` points at one of the timer statics above, written only
/// from the single main-task context before its callback can fire.
unsafe fn create_periodic(
    name: &'static [u8],
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    period_us: u64,
    handle: *mut esp_timer_handle_t,
) {
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(callback),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: name.as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&args, handle);
        if ret != ESP_OK {
            error!("timers: create failed (rc={}), cadence lost", ret);
            return;
        }
        let ret = esp_timer_start_periodic(*handle, period_us);
        if ret != ESP_OK {
            error!("timers: start failed (rc={})", ret);
        }
    }
}

/// Start all cadence timers. `measure_secs` comes from config.
pub fn start_timers(measure_secs: u32) {
    // SAFETY: the statics are written here once at boot from the single
    // main-task context before any timer callbacks fire. The callbacks
    // themselves only call push_event(), which is ISR-safe.
    unsafe {
        create_periodic(
            b"measure\0",
            measure_cb,
            u64::from(measure_secs) * 1_000_000,
            &raw mut MEASURE_TIMER,
        );
        create_periodic(b"minute\0", minute_cb, MINUTE_PERIOD_US, &raw mut MINUTE_TIMER);
        create_periodic(b"hourly\0", hourly_cb, HOURLY_PERIOD_US, &raw mut HOURLY_TIMER);
        create_periodic(b"publish\0", publish_cb, PUBLISH_PERIOD_US, &raw mut PUBLISH_TIMER);
        create_periodic(
            b"watchdog\0",
            watchdog_cb,
            WATCHDOG_PERIOD_US,
            &raw mut WATCHDOG_TIMER,
        );
        info!("timers: measure@{}s minute@60s hourly@1h started", measure_secs);
    }
}

/// Re-arm the measurement timer after a runtime config change.
pub fn set_measure_interval(measure_secs: u32) {
    // SAFETY: MEASURE_TIMER was written once in start_timers(); stop and
    // restart only happen from the main task.
    unsafe {
        let handle = *(&raw const MEASURE_TIMER);
        if handle.is_null() {
            return;
        }
        esp_timer_stop(handle);
        let ret = esp_timer_start_periodic(handle, u64::from(measure_secs) * 1_000_000);
        if ret != ESP_OK {
            error!("timers: measure re-arm failed (rc={})", ret);
        } else {
            info!("timers: measure interval now {} s", measure_secs);
        }
    }
}
