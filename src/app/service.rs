//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the level model, the two ring logs, the trend
//! engine and the alert monitor.  It exposes a clean, hardware-agnostic
//! API.  All I/O flows through port traits injected at call sites, making
//! the entire service testable with mock adapters.
//!
//! ```text
//!  RangeTransducer ──▶ ┌────────────────────────┐ ──▶ EventSink
//!  TemperatureProbe ──▶│       AppService        │
//!  RecordFileStore ◀──▶│ Level · History · Trend │
//!                      └────────────────────────┘
//! ```

use log::{info, warn};

use crate::alerts::AlertMonitor;
use crate::config::DeviceConfig;
use crate::error::StorageError;
use crate::level::{LevelModel, Reading};
use crate::sensors::{MeasurementCycle, CycleOutput};
use crate::storage::ring::RingLog;
use crate::storage::{
    LogKind, RingRecord, HOURLY_CAPACITY, HOURLY_PATH, HOURLY_TMP_PATH, RECENT_CAPACITY,
    RECENT_PATH, RECENT_TMP_PATH,
};
use crate::trend::{detect_events, TankEvent, TrendEngine, TrendSnapshot, MAX_EVENTS};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{
    ConfigPort, EventSink, RangeTransducer, RecordFileStore, TemperatureProbe, TimePort,
};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: DeviceConfig,
    model: LevelModel,
    trend: TrendEngine,
    alerts: AlertMonitor,
    hourly: RingLog,
    recent: RingLog,
    last_reading: Reading,
    measure_count: u64,
    /// A measure request arrived while a cycle was in flight.
    measure_pending: bool,
    config_dirty: bool,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** touch storage — call [`start`](Self::start) next.
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config: config.sanitized(),
            model: LevelModel::new(),
            trend: TrendEngine::new(),
            alerts: AlertMonitor::new(),
            hourly: RingLog::new(HOURLY_PATH, HOURLY_CAPACITY),
            recent: RingLog::new(RECENT_PATH, RECENT_CAPACITY),
            last_reading: Reading::default(),
            measure_count: 0,
            measure_pending: false,
            config_dirty: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Validate (or create) both history stores and announce startup.
    pub fn start(&mut self, store: &mut impl RecordFileStore, sink: &mut impl EventSink) {
        self.hourly.init(store);
        self.recent.init(store);
        sink.emit(&AppEvent::Started {
            measure_secs: u32::from(self.config.measure_secs),
        });
        info!(
            "AppService started, measuring every {} s ({} hourly / {} recent records on flash)",
            self.config.measure_secs,
            self.hourly.count(store),
            self.recent.count(store)
        );
    }

    // ── Measurement orchestration ─────────────────────────────

    /// Kick off a measurement cycle. Returns `false` if one is already in
    /// flight; the request is remembered and replayed when it drains.
    pub fn begin_measurement<R, P>(&mut self, cycle: &mut MeasurementCycle<R, P>) -> bool
    where
        R: RangeTransducer,
        P: TemperatureProbe,
    {
        let started = cycle.start(
            self.config.calibration.avg_samples,
            self.config.temp_probe_enabled,
        );
        if !started {
            self.measure_pending = true;
        }
        started
    }

    /// Advance an in-flight cycle; on completion, fold the raw outputs
    /// through the level model and emit the reading.
    pub fn poll_measurement<R, P>(
        &mut self,
        cycle: &mut MeasurementCycle<R, P>,
        time: &impl TimePort,
        sink: &mut impl EventSink,
    ) -> Option<Reading>
    where
        R: RangeTransducer,
        P: TemperatureProbe,
    {
        let output = cycle.step(time)?;
        let reading = self.finish_measurement(output, time, sink);

        if self.measure_pending {
            self.measure_pending = false;
            self.begin_measurement(cycle);
        }
        Some(reading)
    }

    fn finish_measurement(
        &mut self,
        output: CycleOutput,
        time: &impl TimePort,
        sink: &mut impl EventSink,
    ) -> Reading {
        let mut reading = self.model.update(output.distance_cm, &self.config.calibration);
        reading.temperature_c = output.temperature_c;
        reading.timestamp = time.now_epoch();
        self.last_reading = reading;
        self.measure_count += 1;

        if !reading.valid {
            warn!("measurement produced no usable distance, holding last estimate");
        }
        sink.emit(&AppEvent::ReadingTaken(reading));

        for edge in self.alerts.check(reading.level_pct, &self.config.alerts) {
            sink.emit(&AppEvent::AlertChanged(edge));
        }
        reading
    }

    // ── History ───────────────────────────────────────────────

    /// Append the latest reading to one of the ring logs.
    ///
    /// Skipped while the clock is unsynced (a zero timestamp is the
    /// sentinel for "slot never written") or before the first valid
    /// measurement.
    pub fn snapshot(
        &mut self,
        kind: LogKind,
        store: &mut impl RecordFileStore,
        sink: &mut impl EventSink,
    ) {
        if self.last_reading.timestamp == 0 {
            info!("snapshot skipped, clock not synced yet");
            return;
        }
        if self.measure_count == 0 {
            return;
        }

        let record = RingRecord {
            ts: self.last_reading.timestamp,
            level_pct: self.last_reading.level_pct,
            volume_l: self.last_reading.volume_l,
            temp_c: self.last_reading.temperature_c,
        };
        let ring = self.ring(kind);
        ring.append(store, &record);
        sink.emit(&AppEvent::SnapshotStored {
            log: kind,
            count: ring.count(store),
        });
    }

    /// Erase both logs and drop the trend memo.
    pub fn clear_history(&mut self, store: &mut impl RecordFileStore, sink: &mut impl EventSink) {
        self.hourly.clear(store);
        self.recent.clear(store);
        self.trend.invalidate();
        sink.emit(&AppEvent::HistoryCleared);
    }

    /// Adopt an uploaded backup as the named log. The staging file must
    /// already sit at the log's `.upload.tmp` path.
    pub fn restore_history(
        &mut self,
        kind: LogKind,
        store: &mut impl RecordFileStore,
        sink: &mut impl EventSink,
    ) -> Result<u16, StorageError> {
        let tmp = match kind {
            LogKind::Hourly => HOURLY_TMP_PATH,
            LogKind::Recent => RECENT_TMP_PATH,
        };
        let count = self.ring(kind).replace_from(store, tmp)?;
        self.trend.invalidate();
        sink.emit(&AppEvent::HistoryRestored { log: kind, count });
        Ok(count)
    }

    fn ring(&self, kind: LogKind) -> RingLog {
        match kind {
            LogKind::Hourly => self.hourly,
            LogKind::Recent => self.recent,
        }
    }

    // ── Analytics ─────────────────────────────────────────────

    /// Usage trend for the latest reading (memoized per timestamp).
    pub fn trend(&mut self, store: &mut impl RecordFileStore) -> TrendSnapshot {
        let hourly = self.hourly.read_latest(store, HOURLY_CAPACITY as usize);
        let recent = self.recent.read_latest(store, RECENT_CAPACITY as usize);
        self.trend.compute(&self.last_reading, &hourly, &recent)
    }

    /// Fill/draw/leak events over the minute log.
    pub fn tank_events(
        &mut self,
        store: &mut impl RecordFileStore,
    ) -> heapless::Vec<TankEvent, MAX_EVENTS> {
        let recent = self.recent.read_latest(store, RECENT_CAPACITY as usize);
        detect_events(&recent, &self.config.events)
    }

    /// Emit the midnight summary if it is due.
    pub fn daily_summary_check(
        &mut self,
        store: &mut impl RecordFileStore,
        time: &impl TimePort,
        sink: &mut impl EventSink,
    ) {
        if !self
            .alerts
            .daily_summary_due(time.now_epoch(), time.current_hour(), &self.config.alerts)
        {
            return;
        }
        let trend = self.trend(store);
        sink.emit(&AppEvent::DailySummary {
            reading: self.last_reading,
            trend,
        });
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (from the web API, MQTT, scheduler).
    pub fn handle_command<R, P>(
        &mut self,
        cmd: AppCommand,
        cycle: &mut MeasurementCycle<R, P>,
        store: &mut impl RecordFileStore,
        sink: &mut impl EventSink,
    ) where
        R: RangeTransducer,
        P: TemperatureProbe,
    {
        match cmd {
            AppCommand::MeasureNow => {
                self.begin_measurement(cycle);
            }
            AppCommand::ClearHistory => self.clear_history(store, sink),
            AppCommand::RestoreHistory(kind) => {
                if let Err(e) = self.restore_history(kind, store, sink) {
                    warn!("history restore rejected: {}", e);
                }
            }
            AppCommand::UpdateConfig(new_config) => {
                self.config = new_config.sanitized();
                self.config_dirty = true;
                info!("configuration updated at runtime");
            }
            AppCommand::SaveConfig => {
                self.config_dirty = true;
            }
        }
    }

    /// Flush the config to persistent storage if it changed.
    /// Returns `true` when a save happened.
    pub fn save_config_if_dirty(&mut self, port: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        match port.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("config saved");
                true
            }
            Err(e) => {
                warn!("config save failed: {}", e);
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Latest reading (zeroed before the first measurement).
    pub fn last_reading(&self) -> Reading {
        self.last_reading
    }

    /// Total measurement cycles completed since startup.
    pub fn measure_count(&self) -> u64 {
        self.measure_count
    }

    /// Whether a low or high level alert is currently latched.
    pub fn alert_state(&self) -> (bool, bool) {
        (self.alerts.low_active(), self.alerts.high_active())
    }

    /// Clone of the live configuration (for API read-back or delta updates).
    pub fn current_config(&self) -> DeviceConfig {
        self.config.clone()
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
