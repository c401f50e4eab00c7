//! AquaLevel Firmware — Main Entry Point
//!
//! Hexagonal architecture with an event-driven cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HcSr04 / Ds18b20   LogEventSink    NvsConfigStore             │
//! │  (hardware ports)   (EventSink)     (ConfigPort + WiFi creds)  │
//! │  VfsStore           MqttPublisher   SystemTimeAdapter          │
//! │  (RecordFileStore)  (EventSink+cmd) (TimePort, SNTP-synced)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Level · RingLog history · Trend · Alerts              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  esp_timer cadence ─▶ event queue ─▶ main loop (consumer)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
mod error;
mod events;
mod pins;

pub mod alerts;
pub mod app;
pub mod level;
pub mod payloads;
pub mod storage;
pub mod trend;

mod adapters;
mod drivers;
mod sensors;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use adapters::fs_store::{mount_storage, VfsStore, STORAGE_ROOT};
use adapters::log_sink::LogEventSink;
use adapters::mqtt::{take_command, MqttPublisher};
use adapters::nvs::NvsConfigStore;
use adapters::time::SystemTimeAdapter;
use adapters::wifi::WifiAdapter;
use app::events::AppEvent;
use app::ports::{ConfigPort, EventSink, TimePort};
use app::service::AppService;
use config::DeviceConfig;
use drivers::ds18b20::Ds18b20;
use drivers::hcsr04::HcSr04;
use drivers::watchdog::Watchdog;
use events::{push_event, Event};
use payloads::status_payload;
use sensors::range::RangeSampler;
use sensors::MeasurementCycle;
use storage::LogKind;

// ── Event fan-out ─────────────────────────────────────────────
//
// The service takes a single sink; this adapter fans every AppEvent
// out to the serial log and the broker.

struct FanoutSink {
    log: LogEventSink,
    mqtt: MqttPublisher,
}

impl EventSink for FanoutSink {
    fn emit(&mut self, event: &AppEvent) {
        self.log.emit(event);
        self.mqtt.emit(event);
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AquaLevel v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let watchdog = Watchdog::new();

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let nvs = NvsConfigStore::new()?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };
    let device_name = config.device_name.clone();
    let mut measure_secs = u32::from(config.measure_secs.max(5));
    let temp_probe_enabled = config.temp_probe_enabled;

    // ── 3. History storage ────────────────────────────────────
    mount_storage()?;
    let mut store = VfsStore::new(STORAGE_ROOT);

    // ── 4. Sensor hardware ────────────────────────────────────
    let transducer = HcSr04::new(pins::RANGE_TRIG_GPIO, pins::RANGE_ECHO_GPIO)?;
    let probe = Ds18b20::new(pins::DS18B20_GPIO)?;
    if temp_probe_enabled {
        info!("DS18B20 probe enabled on GPIO{}", pins::DS18B20_GPIO);
    }
    let mut cycle = MeasurementCycle::new(RangeSampler::new(transducer), probe);
    let time = SystemTimeAdapter::new();

    // ── 5. Connectivity ───────────────────────────────────────
    let sys_loop = EspSystemEventLoop::take()?;
    let peripherals = Peripherals::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sys_loop.clone(), None)?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sys_loop)?);

    match nvs.wifi_credentials() {
        Some((ssid, pass)) => {
            if let Err(e) = wifi.set_credentials(ssid.as_str(), pass.as_str()) {
                warn!("WiFi: stored credentials rejected ({}), running offline", e);
            } else if let Err(e) = wifi.connect() {
                warn!("WiFi: boot connect failed ({}), retrying in background", e);
            }
        }
        None => warn!("WiFi: no credentials provisioned, running offline"),
    }

    // ── 6. Event sinks + app service ──────────────────────────
    let mut sink = FanoutSink {
        log: LogEventSink::new(),
        mqtt: MqttPublisher::new(config.mqtt.clone(), device_name.clone()),
    };
    let mut mqtt_started = false;

    let mut app = AppService::new(config);
    app.start(&mut store, &mut sink);

    // ── 7. Cadence timers ─────────────────────────────────────
    drivers::timers::start_timers(measure_secs);

    // First reading right away, before the first MeasureTick lands.
    push_event(Event::MeasureRequested);

    info!("System ready. Entering event loop.");

    // ── 8. Event loop ─────────────────────────────────────────
    let mut last_event_ts: u32 = 0;

    loop {
        events::drain_events(|event| match event {
            Event::MeasureTick | Event::MeasureRequested => {
                app.begin_measurement(&mut cycle);
            }

            Event::MinuteSnapshotDue => {
                app.snapshot(LogKind::Recent, &mut store, &mut sink);
                // Re-scan the minute log; emit only events newer than
                // what we already announced.
                for ev in app.tank_events(&mut store) {
                    if ev.ts > last_event_ts {
                        last_event_ts = ev.ts;
                        sink.emit(&AppEvent::TankEventDetected(ev));
                    }
                }
            }

            Event::HourlySnapshotDue => {
                app.snapshot(LogKind::Hourly, &mut store, &mut sink);
            }

            Event::PublishTick => {
                let reading = app.last_reading();
                if reading.timestamp != 0 {
                    let trend = app.trend(&mut store);
                    let (low, high) = app.alert_state();
                    let status = status_payload(&device_name, &reading, &trend, low, high);
                    sink.mqtt.publish_status(&status);
                }
            }

            Event::DailySummaryCheck => {
                app.daily_summary_check(&mut store, &time, &mut sink);
            }

            Event::CommandReceived => {
                while let Some(cmd) = take_command() {
                    app.handle_command(cmd, &mut cycle, &mut store, &mut sink);
                }
                // A config update may have changed the cadence.
                let now_secs = u32::from(app.current_config().measure_secs);
                if now_secs != measure_secs {
                    measure_secs = now_secs;
                    drivers::timers::set_measure_interval(measure_secs);
                }
            }

            Event::WatchdogTick => {
                watchdog.feed();
            }
        });

        // Advance any in-flight measurement cycle.
        let _ = app.poll_measurement(&mut cycle, &time, &mut sink);

        // WiFi reconnection poll (exponential backoff).
        wifi.poll(time.uptime_ms());

        // Broker session comes up once the network does.
        if wifi.is_connected() && !mqtt_started {
            mqtt_started = true;
            if let Err(e) = sink.mqtt.connect() {
                warn!("MQTT: broker connect failed ({}), publishing disabled", e);
            }
        }

        // Config auto-save after runtime updates.
        app.save_config_if_dirty(&nvs);

        FreeRtos::delay_ms(20);
    }
}
