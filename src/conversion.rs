//! Data conversion utilities for readings
//!
//! Pure derivations from raw sample values to physical quantities. None of
//! these touch the file system; the streaming folds in [`crate::metrics`]
//! call them once per reading.

/// Full scale of the 10-bit ADC
pub const ADC_FULL_SCALE: f64 = 1023.0;

/// Voltages below this are sensor noise or a disconnected battery
pub const MINIMAL_MEASURABLE_VOLTAGE: f64 = 5.0;

/// Convert wheel pulses over one sampling window to km/h
///
/// Fraction of a rotation times circumference (mm -> km), divided by the
/// sampling window in hours.
pub fn speed_kmh(
    impulse_count: u32,
    spokes_count: u32,
    wheel_circumference_mm: u32,
    save_delay_seconds: f64,
) -> f64 {
    if impulse_count == 0 {
        return 0.0;
    }

    let rotations = impulse_count as f64 / spokes_count as f64;
    let distance_km = rotations * wheel_circumference_mm as f64 / 1_000_000.0;
    distance_km * (3600.0 / save_delay_seconds)
}

/// Convert raw ADC value to volts, zeroing values below 5 V
pub fn voltage_v(analog_voltage: u32, max_voltage: f64) -> f64 {
    let vin = analog_voltage as f64 * max_voltage / ADC_FULL_SCALE;
    if vin >= MINIMAL_MEASURABLE_VOLTAGE {
        vin
    } else {
        0.0
    }
}

/// Acceleration between two samples in m/s^2
///
/// Caller guarantees `second_time_ms != first_time_ms`.
pub fn acceleration(
    first_speed_kmh: f64,
    first_time_ms: u64,
    second_speed_kmh: f64,
    second_time_ms: u64,
) -> f64 {
    let speed_change_ms = (second_speed_kmh - first_speed_kmh) * 1000.0 / 3600.0;
    let time_change_s = second_time_ms.abs_diff(first_time_ms) as f64 / 1000.0;
    speed_change_ms / time_change_s
}

/// Distance in km covered between two samples at the first sample's speed
pub fn travel_distance(first_speed_kmh: f64, first_time_ms: u64, second_time_ms: u64) -> f64 {
    let time_change_s = second_time_ms.abs_diff(first_time_ms) as f64 / 1000.0;
    (time_change_s / 60.0) * (first_speed_kmh / 60.0)
}

/// Seconds between two samples
pub fn travel_time(first_time_ms: u64, second_time_ms: u64) -> f64 {
    second_time_ms.abs_diff(first_time_ms) as f64 / 1000.0
}
