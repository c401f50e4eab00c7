//! HC-SR04 ultrasonic transducer driver.
//!
//! Raw GPIO bit-banging: a 10 µs trigger pulse, then busy-wait timing of
//! the echo line with `esp_timer_get_time()`. The echo timeout bounds the
//! busy-wait at ~30 ms, which corresponds to roughly 5 m of range — past
//! the sensor's own limit anyway.

use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::sys::*;
use log::info;

use crate::app::ports::RangeTransducer;
use crate::error::Error;

/// Upper bound on one echo wait, µs.
const ECHO_TIMEOUT_US: i64 = 30_000;

/// Pause between pulses in a burst so in-flight echoes die down, ms.
const SETTLE_MS: u32 = 50;

pub struct HcSr04 {
    trig: i32,
    echo: i32,
}

impl HcSr04 {
    /// Configure the trigger (output, low) and echo (input) pins.
    pub fn new(trig: i32, echo: i32) -> Result<Self, Error> {
        // SAFETY: called once from main before the control loop starts.
        unsafe {
            let out_cfg = gpio_config_t {
                pin_bit_mask: 1u64 << trig,
                mode: gpio_mode_t_GPIO_MODE_OUTPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            if gpio_config(&out_cfg) != ESP_OK {
                return Err(Error::Init("HC-SR04 trigger pin config failed"));
            }
            let in_cfg = gpio_config_t {
                pin_bit_mask: 1u64 << echo,
                mode: gpio_mode_t_GPIO_MODE_INPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            if gpio_config(&in_cfg) != ESP_OK {
                return Err(Error::Init("HC-SR04 echo pin config failed"));
            }
            gpio_set_level(trig, 0);
        }
        info!("HC-SR04: trig=GPIO{} echo=GPIO{}", trig, echo);
        Ok(Self { trig, echo })
    }

    fn now_us() -> i64 {
        // SAFETY: esp_timer_get_time is thread-safe per ESP-IDF docs.
        unsafe { esp_timer_get_time() }
    }
}

impl RangeTransducer for HcSr04 {
    fn trigger_pulse_and_measure(&mut self) -> Option<u32> {
        // SAFETY: the driver owns both pins for the firmware's lifetime.
        unsafe {
            gpio_set_level(self.trig, 0);
            esp_rom_delay_us(2);
            gpio_set_level(self.trig, 1);
            esp_rom_delay_us(10);
            gpio_set_level(self.trig, 0);
        }

        let armed = Self::now_us();
        loop {
            if unsafe { gpio_get_level(self.echo) } == 1 {
                break;
            }
            if Self::now_us() - armed > ECHO_TIMEOUT_US {
                return None;
            }
        }

        let rise = Self::now_us();
        loop {
            if unsafe { gpio_get_level(self.echo) } == 0 {
                break;
            }
            if Self::now_us() - rise > ECHO_TIMEOUT_US {
                return None;
            }
        }

        Some((Self::now_us() - rise) as u32)
    }

    fn settle(&mut self) {
        // Yields to the scheduler, so the watchdog and WiFi stack keep
        // running during a long burst.
        FreeRtos::delay_ms(SETTLE_MS);
    }
}
