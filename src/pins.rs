//! GPIO pin assignments for the AquaLevel board.
//!
//! Single source of truth, no other module hardcodes a pin number.
//! HC-SR04 trigger on GPIO14, echo on GPIO12; the DS18B20 data line sits
//! on GPIO4 with an external 4.7 kOhm pull-up.

/// HC-SR04 trigger output.
pub const RANGE_TRIG_GPIO: i32 = 14;

/// HC-SR04 echo input.
pub const RANGE_ECHO_GPIO: i32 = 12;

/// DS18B20 1-Wire data line.
pub const DS18B20_GPIO: i32 = 4;
