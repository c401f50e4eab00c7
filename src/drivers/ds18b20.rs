//! DS18B20 temperature probe driver (bit-banged 1-Wire).
//!
//! The probe hangs off a single open-drain GPIO with an external 4.7 kΩ
//! pull-up. One conversion at 12-bit resolution takes up to 750 ms, which
//! is why the port exposes a start/poll/read protocol instead of a
//! blocking read — the measurement cycle ranges while the probe converts.
//!
//! The wire protocol lives behind `target_os = "espidf"`; scratchpad CRC
//! and temperature decoding are pure and host-tested.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{info, warn};

#[cfg(target_os = "espidf")]
use crate::app::ports::TemperatureProbe;
#[cfg(target_os = "espidf")]
use crate::error::Error;

/// Maxim/Dallas CRC-8 (poly 0x31 reflected) over a scratchpad prefix.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Decode the scratchpad temperature registers, 1/16 degC per LSB.
pub fn decode_temp(lsb: u8, msb: u8) -> f32 {
    f32::from(i16::from_le_bytes([lsb, msb])) / 16.0
}

#[cfg(target_os = "espidf")]
const CMD_SKIP_ROM: u8 = 0xCC;
#[cfg(target_os = "espidf")]
const CMD_CONVERT_T: u8 = 0x44;
#[cfg(target_os = "espidf")]
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// The power-on reset value of the temperature register. A scratchpad
/// that still reads this right after a conversion means the conversion
/// never ran (probe unpowered or parasite supply sagging).
#[cfg(target_os = "espidf")]
const POWER_ON_TEMP_C: f32 = 85.0;

#[cfg(target_os = "espidf")]
pub struct Ds18b20 {
    pin: i32,
    conversion_started: bool,
}

#[cfg(target_os = "espidf")]
impl Ds18b20 {
    /// Configure the 1-Wire pin as open-drain input/output.
    pub fn new(pin: i32) -> Result<Self, Error> {
        // SAFETY: called once from main before the control loop starts.
        unsafe {
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << pin,
                mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            if gpio_config(&cfg) != ESP_OK {
                return Err(Error::Init("DS18B20 pin config failed"));
            }
            gpio_set_level(pin, 1);
        }
        info!("DS18B20: data=GPIO{}", pin);
        Ok(Self {
            pin,
            conversion_started: false,
        })
    }

    // ── 1-Wire primitives ─────────────────────────────────────
    //
    // Timings per the DS18B20 datasheet. Slot timing is done with
    // esp_rom_delay_us busy-waits; a preempted slot shows up as a CRC
    // failure and the reading is dropped, not misreported.

    fn reset(&mut self) -> bool {
        unsafe {
            gpio_set_level(self.pin, 0);
            esp_rom_delay_us(480);
            gpio_set_level(self.pin, 1);
            esp_rom_delay_us(70);
            let presence = gpio_get_level(self.pin) == 0;
            esp_rom_delay_us(410);
            presence
        }
    }

    fn write_bit(&mut self, bit: bool) {
        unsafe {
            gpio_set_level(self.pin, 0);
            if bit {
                esp_rom_delay_us(6);
                gpio_set_level(self.pin, 1);
                esp_rom_delay_us(64);
            } else {
                esp_rom_delay_us(60);
                gpio_set_level(self.pin, 1);
                esp_rom_delay_us(10);
            }
        }
    }

    fn read_bit(&mut self) -> bool {
        unsafe {
            gpio_set_level(self.pin, 0);
            esp_rom_delay_us(6);
            gpio_set_level(self.pin, 1);
            esp_rom_delay_us(9);
            let bit = gpio_get_level(self.pin) == 1;
            esp_rom_delay_us(55);
            bit
        }
    }

    fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0);
        }
    }

    fn read_byte(&mut self) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit() {
                byte |= 1 << i;
            }
        }
        byte
    }
}

#[cfg(target_os = "espidf")]
impl TemperatureProbe for Ds18b20 {
    fn request_conversion(&mut self) {
        if !self.reset() {
            self.conversion_started = false;
            return;
        }
        self.write_byte(CMD_SKIP_ROM);
        self.write_byte(CMD_CONVERT_T);
        self.conversion_started = true;
    }

    fn is_ready(&mut self) -> bool {
        // The probe holds the line low while converting.
        self.conversion_started && self.read_bit()
    }

    fn read_celsius(&mut self) -> Option<f32> {
        if !self.conversion_started {
            return None;
        }
        self.conversion_started = false;

        if !self.reset() {
            warn!("DS18B20: no presence pulse");
            return None;
        }
        self.write_byte(CMD_SKIP_ROM);
        self.write_byte(CMD_READ_SCRATCHPAD);

        let mut scratch = [0u8; 9];
        for b in &mut scratch {
            *b = self.read_byte();
        }
        if crc8(&scratch[..8]) != scratch[8] {
            warn!("DS18B20: scratchpad CRC mismatch, dropping reading");
            return None;
        }

        let temp = decode_temp(scratch[0], scratch[1]);
        if (temp - POWER_ON_TEMP_C).abs() < f32::EPSILON {
            warn!("DS18B20: power-on value read back, conversion did not run");
            return None;
        }
        Some(temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc8_matches_datasheet_example() {
        // ROM code 28 E1 A2 79 97 09 03 has CRC 0x5A... use a scratch
        // pattern with a self-consistent check instead: CRC over a block
        // followed by its own CRC is zero.
        let block = [0x50u8, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10];
        let crc = crc8(&block);
        let mut with_crc = [0u8; 9];
        with_crc[..8].copy_from_slice(&block);
        with_crc[8] = crc;
        assert_eq!(crc8(&with_crc), 0);
    }

    #[test]
    fn crc8_of_empty_is_zero() {
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn decodes_positive_temperature() {
        // +25.0625 degC = 0x0191.
        assert!((decode_temp(0x91, 0x01) - 25.0625).abs() < 1e-4);
    }

    #[test]
    fn decodes_negative_temperature() {
        // -10.125 degC = 0xFF5E.
        assert!((decode_temp(0x5E, 0xFF) + 10.125).abs() < 1e-4);
    }

    #[test]
    fn decodes_power_on_value() {
        // 85 degC = 0x0550, the reset default.
        assert!((decode_temp(0x50, 0x05) - 85.0).abs() < 1e-4);
    }
}
