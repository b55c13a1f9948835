//! Si7021 relative humidity and temperature sensor.

/// Fixed 7-bit bus address.
pub const SI7021_ADDRESS: u8 = 0x40;

/// Measure relative humidity, no hold master mode.
pub const MEASURE_RH_NO_HOLD: u8 = 0xF5;

/// Measure temperature, no hold master mode.
pub const MEASURE_TEMP_NO_HOLD: u8 = 0xF3;

/// A measurement is two bytes, most significant first.
pub const MEASUREMENT_LEN: usize = 2;

/// Converts a raw humidity code to percent relative humidity.
///
/// The sensor can report slightly outside 0..=100 so the result is clamped.
pub fn relative_humidity(raw: u16) -> f32 {
    let rh = 125.0 * f32::from(raw) / 65536.0 - 6.0;
    rh.clamp(0.0, 100.0)
}

/// Converts a raw temperature code to degrees Celsius.
pub fn temperature(raw: u16) -> f32 {
    175.72 * f32::from(raw) / 65536.0 - 46.85
}

/// Inverse of [`relative_humidity`], used to seed emulated sensors.
pub fn humidity_code(rh: f32) -> u16 {
    (((rh + 6.0) * 65536.0 / 125.0).round() as u32).min(u32::from(u16::MAX)) as u16
}
