//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements       | Connects to                   |
//! |------------|------------------|-------------------------------|
//! | `fs_store` | RecordFileStore  | SPIFFS VFS / host fs / memory |
//! | `hardware` | RangeTransducer  | host simulation               |
//! |            | TemperatureProbe |                               |
//! | `log_sink` | EventSink        | Serial log output             |
//! | `mqtt`     | EventSink        | MQTT broker (retained topics) |
//! | `nvs`      | ConfigPort       | NVS / in-memory store         |
//! | `time`     | TimePort         | ESP32 system timer + SNTP     |
//! | `wifi`     | —                | ESP-IDF WiFi STA              |
//!
//! On the device, `RangeTransducer` and `TemperatureProbe` are satisfied
//! by the drivers themselves (see [`crate::drivers`]).

pub mod fs_store;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
