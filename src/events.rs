//! Timer-driven event system.
//!
//! Events are produced by:
//! - esp_timer callbacks (measurement ticks, snapshot cadence, publish)
//! - Software (web API commands, config changes)
//!
//! Events are consumed by the main control loop, which processes them
//! one at a time in FIFO order.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Timer ISR    │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Software     │────▶│  (lock-free) │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 16;

/// System event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Measurement ───────────────────────────────────────
    /// Periodic measurement timer fired.
    MeasureTick = 0,
    /// Manual measurement requested (web API / MQTT).
    MeasureRequested = 1,

    // ── History cadence ───────────────────────────────────
    /// A minute has elapsed — record into the recent log.
    MinuteSnapshotDue = 10,
    /// An hour boundary passed — record into the hourly log.
    HourlySnapshotDue = 11,

    // ── Communication ─────────────────────────────────────
    /// Telemetry publish timer fired.
    PublishTick = 20,
    /// Check whether the midnight summary is due.
    DailySummaryCheck = 21,
    /// Incoming command queued by an adapter.
    CommandReceived = 30,

    // ── Housekeeping ──────────────────────────────────────
    /// Watchdog heartbeat.
    WatchdogTick = 50,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Timer callbacks write (produce), main loop reads (consume).
// Slots are individual atomics so no reference to shared mutable
// state is ever formed; head/tail atomics enforce the SPSC
// discipline.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
static EVENT_BUFFER: [AtomicU8; EVENT_QUEUE_CAP] =
    [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from timer callback context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    EVENT_BUFFER[head as usize].store(event as u8, Ordering::Relaxed);
    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = EVENT_BUFFER[tail as usize].load(Ordering::Relaxed);
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Check if the event queue is empty.
pub fn queue_is_empty() -> bool {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);
    tail == head
}

/// The queue is a process-wide static; tests that touch it must hold
/// this lock so parallel test threads do not interleave.
#[cfg(test)]
pub(crate) static QUEUE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::MeasureTick),
        1 => Some(Event::MeasureRequested),
        10 => Some(Event::MinuteSnapshotDue),
        11 => Some(Event::HourlySnapshotDue),
        20 => Some(Event::PublishTick),
        21 => Some(Event::DailySummaryCheck),
        30 => Some(Event::CommandReceived),
        50 => Some(Event::WatchdogTick),
        _ => None,
    }
}
