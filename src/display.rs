//! Text rendering of headers and readings
//!
//! Raw renderings are valid log lines; human renderings name every field.

use crate::parser::{format_header, format_reading, READING_SIGIL};
use crate::types::{CountedReading, Header, Reading};

/// Marker appended to human-rendered values outside their normal interval
pub const OUT_OF_RANGE_MARK: &str = " (!)";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayStyle {
    pub raw: bool,
    pub decimal_places: usize,
    pub normal_speed_interval: Option<(f64, f64)>,
    pub normal_voltage_interval: Option<(f64, f64)>,
}

impl Default for DisplayStyle {
    fn default() -> Self {
        Self {
            raw: false,
            decimal_places: 2,
            normal_speed_interval: None,
            normal_voltage_interval: None,
        }
    }
}

/// Anything `show` can print
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayEntry<'a> {
    Header(&'a Header),
    Raw(&'a Reading),
    Derived(&'a CountedReading),
}

impl DisplayEntry<'_> {
    pub fn render(&self, style: &DisplayStyle) -> String {
        match (self, style.raw) {
            (DisplayEntry::Header(header), true) => format_header(header),
            (DisplayEntry::Header(header), false) => format!(
                "date: {} | config: [spokes count: {}, wheel circumference: {} mm, save delay: {} s, max voltage: {} V]",
                header.timestamp,
                header.spokes_count,
                header.wheel_circumference_mm,
                header.save_delay_seconds,
                header.max_voltage
            ),
            (DisplayEntry::Raw(reading), true) => format_reading(reading),
            (DisplayEntry::Raw(reading), false) => format!(
                "millis_passed: {} ms, impulse_count: {}, analog_voltage: {}",
                reading.millis_passed, reading.impulse_count, reading.analog_voltage
            ),
            (DisplayEntry::Derived(counted), true) => format!(
                "{} {} | {:.prec$} | {:.prec$}",
                READING_SIGIL,
                counted.millis_passed,
                counted.speed_kmh,
                counted.voltage_v,
                prec = style.decimal_places
            ),
            (DisplayEntry::Derived(counted), false) => {
                let time = counted
                    .absolute_time
                    .map(|t| t.format("%d.%m.%Y-%H:%M:%S%.3f").to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "time: {}, millis_passed: {} ms, speed: {:.prec$} km/h{}, voltage: {:.prec$} V{}",
                    time,
                    counted.millis_passed,
                    counted.speed_kmh,
                    range_mark(counted.speed_kmh, style.normal_speed_interval),
                    counted.voltage_v,
                    range_mark(counted.voltage_v, style.normal_voltage_interval),
                    prec = style.decimal_places
                )
            }
        }
    }
}

fn range_mark(value: f64, interval: Option<(f64, f64)>) -> &'static str {
    match interval {
        Some((low, high)) if value < low || value > high => OUT_OF_RANGE_MARK,
        _ => "",
    }
}

/// Prefixes items with `N) ` when enabled; the count lives in the adapter
#[derive(Debug, Clone)]
pub struct Enumerated<I> {
    inner: I,
    enabled: bool,
    counter: usize,
}

impl<I> Enumerated<I> {
    pub fn new(inner: I, enabled: bool) -> Self {
        Self {
            inner,
            enabled,
            counter: 0,
        }
    }
}

impl<I: Iterator<Item = String>> Iterator for Enumerated<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let line = self.inner.next()?;
        if !self.enabled {
            return Some(line);
        }
        self.counter += 1;
        Some(format!("{}) {}", self.counter, line))
    }
}
