use crate::conversion::{speed_kmh, voltage_v};
use crate::types::Header;
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// One raw sample line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Elapsed milliseconds since the owning header
    pub millis_passed: u64,
    /// Wheel pulses since the previous sample
    pub impulse_count: u32,
    /// Raw ADC value
    pub analog_voltage: u32,
}

impl Reading {
    /// Header timestamp plus `millis_passed`; `None` only on calendar overflow
    pub fn absolute_time(&self, header: &Header) -> Option<NaiveDateTime> {
        let millis = i64::try_from(self.millis_passed).ok()?;
        header
            .datetime()
            .checked_add_signed(TimeDelta::try_milliseconds(millis)?)
    }
}

/// Reading with physical values derived from its header's calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountedReading {
    pub millis_passed: u64,
    pub speed_kmh: f64,
    pub voltage_v: f64,
    pub absolute_time: Option<NaiveDateTime>,
}

impl CountedReading {
    pub fn new(reading: &Reading, header: &Header) -> Self {
        Self {
            millis_passed: reading.millis_passed,
            speed_kmh: speed_kmh(
                reading.impulse_count,
                header.spokes_count,
                header.wheel_circumference_mm,
                header.save_delay_seconds,
            ),
            voltage_v: voltage_v(reading.analog_voltage, header.max_voltage),
            absolute_time: reading.absolute_time(header),
        }
    }
}
