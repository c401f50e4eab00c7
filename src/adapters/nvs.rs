//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the AquaLevel monitor, plus access to the
//! WiFi credentials stored in their own namespace.
//!
//! Saves are validated field by field before touching flash — a
//! compromised network channel must not be able to persist a zero
//! measurement interval or a 10-million-sample burst. Loads are
//! sanitized, not rejected: a blob written by an older firmware with
//! out-of-range fields is clamped into service instead of discarded.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::DeviceConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "aqualevel";
const CONFIG_KEY: &str = "devcfg";
const CRED_NAMESPACE: &str = "wifi";

const MAX_BLOB_SIZE: usize = 2048;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsConfigStore {
    /// Create the store and initialise NVS flash.
    ///
    /// On first boot or after an IDF version bump the partition is erased
    /// and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase run from the single
            // main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsConfigStore: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsConfigStore: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, run a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    fn read_blob(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .get(&Self::composite_key(namespace, key))
                .cloned()
        }

        #[cfg(target_os = "espidf")]
        {
            let mut key_buf = [0u8; 16];
            let kb = key.as_bytes();
            let kl = kb.len().min(15);
            key_buf[..kl].copy_from_slice(&kb[..kl]);

            Self::with_nvs_handle(namespace, false, |handle| {
                let mut size: usize = 0;
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret != ESP_OK || size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ret);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf)
            })
            .ok()
        }
    }

    fn write_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let mut key_buf = [0u8; 16];
            let kb = key.as_bytes();
            let kl = kb.len().min(15);
            key_buf[..kl].copy_from_slice(&kb[..kl]);

            Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            })
            .map_err(|e| {
                warn!("NVS write error {}", e);
                ConfigError::IoError
            })
        }
    }

    // ── WiFi credentials ──────────────────────────────────────

    /// Stored station credentials, if provisioned.
    pub fn wifi_credentials(&self) -> Option<(heapless::String<32>, heapless::String<64>)> {
        let ssid_raw = self.read_blob(CRED_NAMESPACE, "ssid")?;
        let pass_raw = self.read_blob(CRED_NAMESPACE, "pass").unwrap_or_default();
        let ssid = heapless::String::try_from(core::str::from_utf8(&ssid_raw).ok()?).ok()?;
        let pass =
            heapless::String::try_from(core::str::from_utf8(&pass_raw).ok()?).ok()?;
        Some((ssid, pass))
    }

    /// Persist station credentials (from the provisioning flow).
    pub fn store_wifi_credentials(&self, ssid: &str, pass: &str) -> Result<(), ConfigError> {
        self.write_blob(CRED_NAMESPACE, "ssid", ssid.as_bytes())?;
        self.write_blob(CRED_NAMESPACE, "pass", pass.as_bytes())
    }
}

fn validate_config(cfg: &DeviceConfig) -> Result<(), ConfigError> {
    if !(1..=30).contains(&cfg.calibration.avg_samples) {
        return Err(ConfigError::ValidationFailed("avg_samples must be 1–30"));
    }
    if !(0.01..=1.0).contains(&cfg.calibration.ema_alpha) {
        return Err(ConfigError::ValidationFailed("ema_alpha must be 0.01–1.0"));
    }
    if cfg.calibration.empty_dist_cm <= 0.0 || cfg.calibration.empty_dist_cm > 500.0 {
        return Err(ConfigError::ValidationFailed(
            "empty_dist_cm must be 0–500 cm",
        ));
    }
    if cfg.calibration.diameter_cm < 0.0 || cfg.calibration.diameter_cm > 1000.0 {
        return Err(ConfigError::ValidationFailed(
            "diameter_cm must be 0–1000 cm",
        ));
    }
    if cfg.measure_secs < 5 {
        return Err(ConfigError::ValidationFailed("measure_secs must be >= 5"));
    }
    if !(0.0..=100.0).contains(&cfg.alerts.low_pct) || !(0.0..=100.0).contains(&cfg.alerts.high_pct)
    {
        return Err(ConfigError::ValidationFailed(
            "alert thresholds must be 0–100 %",
        ));
    }
    if cfg.alerts.low_pct >= cfg.alerts.high_pct {
        return Err(ConfigError::ValidationFailed("low_pct must be < high_pct"));
    }
    if cfg.events.fill_l <= 0.0 || cfg.events.draw_l >= 0.0 || cfg.events.leak_l >= 0.0 {
        return Err(ConfigError::ValidationFailed(
            "event thresholds have fixed signs (fill > 0, draw/leak < 0)",
        ));
    }
    if cfg.events.leak_rate_lph >= 0.0 {
        return Err(ConfigError::ValidationFailed("leak_rate_lph must be < 0"));
    }
    if cfg.mqtt.enabled && cfg.mqtt.host.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "mqtt.host required when mqtt.enabled",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        match self.read_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Some(bytes) => {
                let cfg: DeviceConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsConfigStore: loaded config ({} bytes)", bytes.len());
                Ok(cfg.sanitized())
            }
            None => {
                info!("NvsConfigStore: no stored config, using defaults");
                Ok(DeviceConfig::default())
            }
        }
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
        info!("NvsConfigStore: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
