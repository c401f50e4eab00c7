//! MQTT publisher adapter.
//!
//! Implements [`EventSink`] by pushing readings and alerts to a broker
//! under the configured base topic:
//!
//! | Topic suffix | Payload                      | Retained |
//! |--------------|------------------------------|----------|
//! | `level`      | percent, one decimal         | yes      |
//! | `distance`   | cm, one decimal              | yes      |
//! | `volume`     | litres, one decimal          | yes      |
//! | `free`       | litres, one decimal          | yes      |
//! | `json`       | full status object           | yes      |
//! | `alert`      | edge name                    | no       |
//! | `event`      | fill/draw/leak object        | no       |
//! | `summary`    | daily usage object           | no       |
//!
//! The adapter also subscribes to `<base>/cmd` and relays `measure`,
//! `clear_history` and `save_config` payloads into the event queue.
//!
//! Retained topics let a dashboard that subscribes hours later still see
//! the last published state. A failed publish suppresses the adapter for
//! 15 s so a broker outage cannot stall the measurement cadence.

use core::sync::atomic::{AtomicU8, Ordering};

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;
use serde_json::json;

use std::sync::Mutex;

use crate::adapters::time::SystemTimeAdapter;
use crate::app::commands::AppCommand;
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, TimePort};
use crate::config::{DeviceConfig, MqttConfig};
use crate::level::Reading;
use crate::payloads::{self, StatusPayload};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration, QoS};

/// How long to stay quiet after a failed publish.
const PUBLISH_BACKOFF_MS: u64 = 15_000;

// ── Inbound command slot ──────────────────────────────────────
//
// The broker callback runs on the MQTT task and may not touch the
// service directly. It parses the payload, stores the command here and
// pushes `Event::CommandReceived` so the main loop picks it up.

const CMD_NONE: u8 = 0;
const CMD_MEASURE: u8 = 1;
const CMD_CLEAR_HISTORY: u8 = 2;
const CMD_SAVE_CONFIG: u8 = 3;
const CMD_UPDATE_CONFIG: u8 = 4;

static PENDING_COMMAND: AtomicU8 = AtomicU8::new(CMD_NONE);
static PENDING_CONFIG: Mutex<Option<DeviceConfig>> = Mutex::new(None);

/// Parse a raw command payload and queue it for the main loop.
///
/// Accepted payloads: `measure`, `clear_history`, `save_config`, and
/// `config <full DeviceConfig JSON>`. Returns `false` for unknown
/// payloads and when the queue is full.
pub fn queue_command(raw: &[u8]) -> bool {
    let code = match raw {
        b"measure" => CMD_MEASURE,
        b"clear_history" => CMD_CLEAR_HISTORY,
        b"save_config" => CMD_SAVE_CONFIG,
        _ => {
            let Some(body) = raw.strip_prefix(b"config ") else {
                return false;
            };
            let Ok(cfg) = serde_json::from_slice::<DeviceConfig>(body) else {
                return false;
            };
            if let Ok(mut slot) = PENDING_CONFIG.lock() {
                *slot = Some(cfg);
            }
            CMD_UPDATE_CONFIG
        }
    };
    PENDING_COMMAND.store(code, Ordering::Release);
    crate::events::push_event(crate::events::Event::CommandReceived)
}

/// Pop the pending broker command, if any.
pub fn take_command() -> Option<AppCommand> {
    match PENDING_COMMAND.swap(CMD_NONE, Ordering::AcqRel) {
        CMD_MEASURE => Some(AppCommand::MeasureNow),
        CMD_CLEAR_HISTORY => Some(AppCommand::ClearHistory),
        CMD_SAVE_CONFIG => Some(AppCommand::SaveConfig),
        CMD_UPDATE_CONFIG => PENDING_CONFIG
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(AppCommand::UpdateConfig),
        _ => None,
    }
}

pub struct MqttPublisher {
    cfg: MqttConfig,
    device_name: heapless::String<32>,
    clock: SystemTimeAdapter,
    suppressed_until_ms: u64,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    /// Simulation: record of (topic, payload, retained) for tests.
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, String, bool)>,
}

impl MqttPublisher {
    pub fn new(cfg: MqttConfig, device_name: heapless::String<32>) -> Self {
        Self {
            cfg,
            device_name,
            clock: SystemTimeAdapter::new(),
            suppressed_until_ms: 0,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
        }
    }

    /// Establish the broker session. Call after the network is up.
    #[cfg(target_os = "espidf")]
    pub fn connect(&mut self) -> Result<(), crate::error::Error> {
        use crate::error::{CommsError, Error};

        if !self.cfg.enabled {
            return Ok(());
        }
        let url = format!("mqtt://{}:{}", self.cfg.host, self.cfg.port);
        let conf = MqttClientConfiguration {
            client_id: Some(self.device_name.as_str()),
            username: (!self.cfg.username.is_empty()).then(|| self.cfg.username.as_str()),
            password: (!self.cfg.password.is_empty()).then(|| self.cfg.password.as_str()),
            ..Default::default()
        };
        let mut client = EspMqttClient::new_cb(&url, &conf, |event| {
            use esp_idf_svc::mqtt::client::EventPayload::Received;
            if let Received { topic, data, .. } = event.payload() {
                if topic.is_some_and(|t| t.ends_with("/cmd")) && !queue_command(data) {
                    warn!("MQTT: unknown command payload");
                }
            } else {
                log::debug!("mqtt event: {:?}", event.payload());
            }
        })
        .map_err(|_| Error::Comms(CommsError::MqttPublishFailed))?;

        let cmd_topic = self.topic("cmd");
        if client.subscribe(&cmd_topic, QoS::AtMostOnce).is_err() {
            warn!("MQTT: subscribe to {} failed", cmd_topic);
        }
        self.client = Some(client);
        info!("MQTT: session opened to {}", url);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn connect(&mut self) -> Result<(), crate::error::Error> {
        info!("MQTT(sim): session opened to {}:{}", self.cfg.host, self.cfg.port);
        Ok(())
    }

    /// Simulation only: messages published so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(String, String, bool)] {
        &self.published
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.cfg.base_topic, suffix)
    }

    fn publish(&mut self, suffix: &str, payload: &str, retained: bool) {
        let now = self.clock.uptime_ms();
        if now < self.suppressed_until_ms {
            return;
        }
        let topic = self.topic(suffix);

        #[cfg(target_os = "espidf")]
        {
            let Some(client) = self.client.as_mut() else {
                return;
            };
            if client
                .enqueue(&topic, QoS::AtMostOnce, retained, payload.as_bytes())
                .is_err()
            {
                warn!("MQTT: publish to {} failed, backing off", topic);
                self.suppressed_until_ms = now + PUBLISH_BACKOFF_MS;
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::debug!("MQTT(sim): {} <- {} (retained={})", topic, payload, retained);
            self.published.push((topic, payload.to_string(), retained));
        }
    }

    fn publish_reading(&mut self, r: &Reading) {
        if !r.valid {
            return;
        }
        self.publish("level", &format!("{:.1}", r.level_pct), true);
        self.publish("distance", &format!("{:.1}", r.distance_cm), true);
        self.publish("volume", &format!("{:.1}", r.volume_l), true);
        self.publish("free", &format!("{:.1}", r.free_l), true);
    }

    /// Push the full status object to the retained `json` topic. Driven
    /// by the publish tick (it folds in trend and alert state, which the
    /// per-reading emit path does not see).
    pub fn publish_status(&mut self, status: &StatusPayload) {
        if !self.cfg.enabled {
            return;
        }
        match serde_json::to_string(status) {
            Ok(body) => self.publish("json", &body, true),
            Err(e) => info!("MQTT: status serialise failed: {}", e),
        }
    }
}

impl EventSink for MqttPublisher {
    fn emit(&mut self, event: &AppEvent) {
        if !self.cfg.enabled {
            return;
        }
        match event {
            AppEvent::ReadingTaken(r) => self.publish_reading(r),
            AppEvent::AlertChanged(edge) => {
                self.publish("alert", &format!("{edge:?}"), false);
            }
            AppEvent::TankEventDetected(ev) => {
                let body = payloads::events_payload(core::slice::from_ref(ev));
                if let Ok(body) = serde_json::to_string(&body[0]) {
                    self.publish("event", &body, false);
                }
            }
            AppEvent::DailySummary { reading, trend } => {
                let body = json!({
                    "level_pct": (reading.level_pct * 10.0).round() / 10.0,
                    "volume_l": (reading.volume_l * 10.0).round() / 10.0,
                    "used_24h_l": trend.used_24h_l,
                    "rate_24h_lpd": trend.rate_24h_lpd,
                    "days_left": trend.days_left,
                });
                self.publish("summary", &body.to_string(), false);
            }
            AppEvent::Started { .. } => {
                self.publish("status", "online", true);
            }
            AppEvent::SnapshotStored { .. }
            | AppEvent::HistoryCleared
            | AppEvent::HistoryRestored { .. } => {}
        }
    }
}
