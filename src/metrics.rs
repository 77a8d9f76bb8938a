//! Streaming metric folds
//!
//! Each metric is a [`Fold`]: a small accumulator fed one associated event at
//! a time by [`run_fold`]. A pass reads the file once, front to back, and
//! keeps O(1) state regardless of file size ([`DailyTravel`] keeps one entry
//! per calendar day).
//!
//! Readings before the window start are skipped; the first reading past the
//! window end stops the pass, since validated files are time-ordered.
//!
//! # Example
//! ```rust,no_run
//! use marp::{metrics, MetricOptions, ReadableFile, MAXIMAL_FILE_LINES};
//!
//! let file = ReadableFile::open("ride.txt", MAXIMAL_FILE_LINES).unwrap();
//! let speed = metrics::average_speed(&file, &MetricOptions::default()).unwrap();
//! println!("Average speed: {speed:.2} km/h");
//! ```

use crate::conversion::{
    acceleration, travel_distance as distance_between, travel_time as time_between,
};
use crate::error::Result;
use crate::filters::DateTimeWindow;
use crate::parser::{ParseMode, ReadableFile, SessionEvent, TimedReading};
use crate::types::{CountedReading, Header};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

/// Accumulator driven by [`run_fold`]
pub trait Fold {
    type Output;

    /// A header line. `continuation` is set when it repeats the previous
    /// header's timestamp, i.e. the same logical session goes on.
    fn on_header(&mut self, _header: &Header, _continuation: bool) {}

    /// An in-window reading with its derived values
    fn on_reading(&mut self, reading: &TimedReading, counted: &CountedReading);

    /// End of the pass
    fn finish(self) -> Self::Output;
}

/// Feed associated events through `fold`, bounded by `window`
pub fn run_fold<I, F>(events: I, window: &DateTimeWindow, mut fold: F) -> Result<F::Output>
where
    I: Iterator<Item = Result<SessionEvent>>,
    F: Fold,
{
    for event in events {
        match event? {
            SessionEvent::Header {
                header,
                continuation,
                ..
            } => fold.on_header(&header, continuation),
            SessionEvent::Reading(timed) => {
                if window.is_before(timed.absolute_time) {
                    continue;
                }
                if window.is_after(timed.absolute_time) {
                    break;
                }
                let counted = CountedReading::new(&timed.reading, &timed.header);
                fold.on_reading(&timed, &counted);
            }
        }
    }
    Ok(fold.finish())
}

/// Window and parse mode shared by every metric call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricOptions {
    pub window: DateTimeWindow,
    pub mode: ParseMode,
}

impl MetricOptions {
    pub fn new(window: DateTimeWindow, mode: ParseMode) -> Self {
        Self { window, mode }
    }
}

fn run_on_file<F: Fold>(file: &ReadableFile, options: &MetricOptions, fold: F) -> Result<F::Output> {
    debug!("Metric pass over {}", file.path().display());
    run_fold(file.sessions(options.mode)?, &options.window, fold)
}

// ── Voltage interval ──────────────────────────────────────────────────────────

/// Lowest and highest derived voltage (V)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageInterval {
    pub min: f64,
    pub max: f64,
}

/// Min/max of derived voltages at or above a search threshold
#[derive(Debug, Clone)]
pub struct VoltageIntervalFold {
    minimal_voltage_search: f64,
    interval: Option<VoltageInterval>,
}

impl VoltageIntervalFold {
    pub fn new(minimal_voltage_search: f64) -> Self {
        Self {
            minimal_voltage_search,
            interval: None,
        }
    }
}

impl Fold for VoltageIntervalFold {
    type Output = Option<VoltageInterval>;

    fn on_reading(&mut self, _reading: &TimedReading, counted: &CountedReading) {
        let voltage = counted.voltage_v;
        if voltage < self.minimal_voltage_search {
            return;
        }
        self.interval = Some(match self.interval {
            Some(interval) => VoltageInterval {
                min: interval.min.min(voltage),
                max: interval.max.max(voltage),
            },
            None => VoltageInterval {
                min: voltage,
                max: voltage,
            },
        });
    }

    fn finish(self) -> Self::Output {
        self.interval
    }
}

// ── Average acceleration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct SpeedPoint {
    speed_kmh: f64,
    millis: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Rising,
    Falling,
}

/// Mean acceleration over monotonic speed runs (m/s^2).
///
/// The reading stream is cut into runs of rising or falling speed. When the
/// direction reverses, the run from its first to its last point yields one
/// acceleration sample, kept when its sign matches `find_increase`.
/// Equal consecutive speeds extend the current run; before a direction is
/// known they move the run start forward instead. A new session (header
/// that is not a continuation) and the end of the pass also close the run.
#[derive(Debug, Clone)]
pub struct AverageAcceleration {
    find_increase: bool,
    start: Option<SpeedPoint>,
    end: Option<SpeedPoint>,
    trend: Option<Trend>,
    sum: f64,
    count: usize,
}

impl AverageAcceleration {
    pub fn new(find_increase: bool) -> Self {
        Self {
            find_increase,
            start: None,
            end: None,
            trend: None,
            sum: 0.0,
            count: 0,
        }
    }

    fn close_run(&mut self) {
        let (Some(start), Some(end), Some(_)) = (self.start, self.end, self.trend) else {
            return;
        };
        if start.millis == end.millis {
            return;
        }

        let value = acceleration(start.speed_kmh, start.millis, end.speed_kmh, end.millis);
        if (self.find_increase && value > 0.0) || (!self.find_increase && value < 0.0) {
            self.sum += value;
            self.count += 1;
        }
    }

    fn reset(&mut self) {
        self.start = None;
        self.end = None;
        self.trend = None;
    }
}

impl Fold for AverageAcceleration {
    type Output = f64;

    fn on_header(&mut self, _header: &Header, continuation: bool) {
        if !continuation {
            self.close_run();
            self.reset();
        }
    }

    fn on_reading(&mut self, reading: &TimedReading, counted: &CountedReading) {
        let point = SpeedPoint {
            speed_kmh: counted.speed_kmh,
            millis: reading.reading.millis_passed,
        };

        let Some(last) = self.end else {
            self.start = Some(point);
            self.end = Some(point);
            return;
        };

        let step = match point.speed_kmh.partial_cmp(&last.speed_kmh) {
            Some(Ordering::Greater) => Trend::Rising,
            Some(Ordering::Less) => Trend::Falling,
            _ => {
                if self.trend.is_none() {
                    self.start = Some(point);
                }
                self.end = Some(point);
                return;
            }
        };

        match self.trend {
            None => self.trend = Some(step),
            Some(trend) if trend != step => {
                self.close_run();
                self.start = Some(last);
                self.trend = Some(step);
            }
            Some(_) => {}
        }
        self.end = Some(point);
    }

    fn finish(mut self) -> Self::Output {
        self.close_run();
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

// ── Average speed ─────────────────────────────────────────────────────────────

/// Mean of derived speeds (km/h), 0 when no reading qualifies
#[derive(Debug, Clone, Default)]
pub struct AverageSpeed {
    sum: f64,
    count: usize,
}

impl Fold for AverageSpeed {
    type Output = f64;

    fn on_reading(&mut self, _reading: &TimedReading, counted: &CountedReading) {
        self.sum += counted.speed_kmh;
        self.count += 1;
    }

    fn finish(self) -> Self::Output {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

// ── Travel time and distance ──────────────────────────────────────────────────

/// Sum of gaps between consecutive readings of a session (s)
#[derive(Debug, Clone, Default)]
pub struct TravelTime {
    previous_millis: Option<u64>,
    total_seconds: f64,
}

impl Fold for TravelTime {
    type Output = f64;

    fn on_header(&mut self, _header: &Header, continuation: bool) {
        if !continuation {
            self.previous_millis = None;
        }
    }

    fn on_reading(&mut self, reading: &TimedReading, _counted: &CountedReading) {
        let millis = reading.reading.millis_passed;
        if let Some(previous) = self.previous_millis {
            self.total_seconds += time_between(previous, millis);
        }
        self.previous_millis = Some(millis);
    }

    fn finish(self) -> Self::Output {
        self.total_seconds
    }
}

/// Distance over consecutive readings of a session at the earlier reading's speed (km)
#[derive(Debug, Clone, Default)]
pub struct TravelDistance {
    previous: Option<SpeedPoint>,
    total_km: f64,
}

impl Fold for TravelDistance {
    type Output = f64;

    fn on_header(&mut self, _header: &Header, continuation: bool) {
        if !continuation {
            self.previous = None;
        }
    }

    fn on_reading(&mut self, reading: &TimedReading, counted: &CountedReading) {
        let millis = reading.reading.millis_passed;
        if let Some(previous) = self.previous {
            self.total_km += distance_between(previous.speed_kmh, previous.millis, millis);
        }
        self.previous = Some(SpeedPoint {
            speed_kmh: counted.speed_kmh,
            millis,
        });
    }

    fn finish(self) -> Self::Output {
        self.total_km
    }
}

// ── Daily travel ──────────────────────────────────────────────────────────────

/// Travel totals for one calendar day of session headers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayTravel {
    pub date: NaiveDate,
    pub travel_time_s: f64,
    pub travel_distance_km: f64,
}

/// Travel time and distance grouped by the governing header's date
#[derive(Debug, Clone, Default)]
pub struct DailyTravel {
    time: TravelTime,
    distance: TravelDistance,
    days: Vec<DayTravel>,
}

impl Fold for DailyTravel {
    type Output = Vec<DayTravel>;

    fn on_header(&mut self, header: &Header, continuation: bool) {
        self.time.on_header(header, continuation);
        self.distance.on_header(header, continuation);
    }

    fn on_reading(&mut self, reading: &TimedReading, counted: &CountedReading) {
        let (time_before, distance_before) = (self.time.total_seconds, self.distance.total_km);
        self.time.on_reading(reading, counted);
        self.distance.on_reading(reading, counted);

        let date = reading.header.timestamp.date();
        if self.days.last().map_or(true, |day| day.date != date) {
            self.days.push(DayTravel {
                date,
                travel_time_s: 0.0,
                travel_distance_km: 0.0,
            });
        }
        if let Some(day) = self.days.last_mut() {
            day.travel_time_s += self.time.total_seconds - time_before;
            day.travel_distance_km += self.distance.total_km - distance_before;
        }
    }

    fn finish(self) -> Self::Output {
        self.days
            .into_iter()
            .filter(|day| day.travel_time_s != 0.0 || day.travel_distance_km != 0.0)
            .collect()
    }
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Every scalar metric from a single pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub voltage_interval: Option<VoltageInterval>,
    pub average_increase_acceleration: f64,
    pub average_decrease_acceleration: f64,
    pub average_speed_kmh: f64,
    pub travel_time_s: f64,
    pub travel_distance_km: f64,
}

/// Runs the scalar folds side by side
#[derive(Debug, Clone)]
pub struct SummaryFold {
    voltage: VoltageIntervalFold,
    increase: AverageAcceleration,
    decrease: AverageAcceleration,
    speed: AverageSpeed,
    time: TravelTime,
    distance: TravelDistance,
}

impl SummaryFold {
    pub fn new(minimal_voltage_search: f64) -> Self {
        Self {
            voltage: VoltageIntervalFold::new(minimal_voltage_search),
            increase: AverageAcceleration::new(true),
            decrease: AverageAcceleration::new(false),
            speed: AverageSpeed::default(),
            time: TravelTime::default(),
            distance: TravelDistance::default(),
        }
    }
}

impl Fold for SummaryFold {
    type Output = Summary;

    fn on_header(&mut self, header: &Header, continuation: bool) {
        self.increase.on_header(header, continuation);
        self.decrease.on_header(header, continuation);
        self.time.on_header(header, continuation);
        self.distance.on_header(header, continuation);
    }

    fn on_reading(&mut self, reading: &TimedReading, counted: &CountedReading) {
        self.voltage.on_reading(reading, counted);
        self.increase.on_reading(reading, counted);
        self.decrease.on_reading(reading, counted);
        self.speed.on_reading(reading, counted);
        self.time.on_reading(reading, counted);
        self.distance.on_reading(reading, counted);
    }

    fn finish(self) -> Self::Output {
        Summary {
            voltage_interval: self.voltage.finish(),
            average_increase_acceleration: self.increase.finish(),
            average_decrease_acceleration: self.decrease.finish(),
            average_speed_kmh: self.speed.finish(),
            travel_time_s: self.time.finish(),
            travel_distance_km: self.distance.finish(),
        }
    }
}

// ── File-level entry points ───────────────────────────────────────────────────

/// Min/max voltage of readings at or above `minimal_voltage_search`; `None` if none qualify
pub fn voltage_interval(
    file: &ReadableFile,
    options: &MetricOptions,
    minimal_voltage_search: f64,
) -> Result<Option<VoltageInterval>> {
    run_on_file(file, options, VoltageIntervalFold::new(minimal_voltage_search))
}

/// Mean positive (`find_increase`) or negative acceleration; 0 when nothing qualifies
pub fn average_acceleration(
    file: &ReadableFile,
    options: &MetricOptions,
    find_increase: bool,
) -> Result<f64> {
    run_on_file(file, options, AverageAcceleration::new(find_increase))
}

pub fn average_speed(file: &ReadableFile, options: &MetricOptions) -> Result<f64> {
    run_on_file(file, options, AverageSpeed::default())
}

pub fn travel_time(file: &ReadableFile, options: &MetricOptions) -> Result<f64> {
    run_on_file(file, options, TravelTime::default())
}

pub fn travel_distance(file: &ReadableFile, options: &MetricOptions) -> Result<f64> {
    run_on_file(file, options, TravelDistance::default())
}

pub fn daily_travel(file: &ReadableFile, options: &MetricOptions) -> Result<Vec<DayTravel>> {
    run_on_file(file, options, DailyTravel::default())
}

pub fn summary(
    file: &ReadableFile,
    options: &MetricOptions,
    minimal_voltage_search: f64,
) -> Result<Summary> {
    run_on_file(file, options, SummaryFold::new(minimal_voltage_search))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::session_events;
    use std::io::Cursor;

    // 20 spokes, 2100 mm, 1 s delay: one impulse is 0.378 km/h
    const HEADER_A: &str = "{H} 01.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )";
    const HEADER_B: &str = "{H} 02.01.2024-08:00:00 ( 20 | 2100 | 1.0 | 12 )";
    const KMH_PER_IMPULSE: f64 = 0.378;

    fn fold<F: Fold>(input: &str, window: DateTimeWindow, fold: F) -> F::Output {
        run_fold(
            session_events(Cursor::new(input), ParseMode::Strict),
            &window,
            fold,
        )
        .unwrap()
    }

    fn log(lines: &[&str]) -> String {
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    #[test]
    fn test_voltage_interval_min_max() {
        let input = log(&[HEADER_A, "{R} 0 | 0 | 1023", "{R} 10 | 0 | 900", "{R} 20 | 0 | 100"]);
        let interval = fold(&input, DateTimeWindow::unbounded(), VoltageIntervalFold::new(5.0))
            .expect("interval");
        assert_eq!(interval.max, 12.0);
        assert!((interval.min - 900.0 * 12.0 / 1023.0).abs() < 1e-9);
    }

    #[test]
    fn test_voltage_interval_empty_when_below_threshold() {
        let input = log(&[HEADER_A, "{R} 0 | 0 | 500", "{R} 10 | 0 | 600"]);
        let interval = fold(&input, DateTimeWindow::unbounded(), VoltageIntervalFold::new(12.0));
        assert_eq!(interval, None);
    }

    #[test]
    fn test_average_speed_mean_and_empty() {
        let input = log(&[HEADER_A, "{R} 0 | 5 | 0", "{R} 1000 | 15 | 0"]);
        let speed = fold(&input, DateTimeWindow::unbounded(), AverageSpeed::default());
        assert!((speed - 10.0 * KMH_PER_IMPULSE).abs() < 1e-9);

        let empty = fold(&log(&[HEADER_A]), DateTimeWindow::unbounded(), AverageSpeed::default());
        assert_eq!(empty, 0.0);
    }

    #[test]
    fn test_travel_time_resets_per_session() {
        let input = log(&[
            HEADER_A,
            "{R} 1000 | 1 | 0",
            "{R} 3000 | 1 | 0",
            HEADER_B,
            "{R} 50000 | 1 | 0",
            "{R} 50500 | 1 | 0",
        ]);
        let seconds = fold(&input, DateTimeWindow::unbounded(), TravelTime::default());
        assert_eq!(seconds, 2.5);
    }

    #[test]
    fn test_travel_time_continues_across_duplicate_header() {
        let input = log(&[HEADER_A, "{R} 1000 | 1 | 0", HEADER_A, "{R} 3000 | 1 | 0"]);
        let seconds = fold(&input, DateTimeWindow::unbounded(), TravelTime::default());
        assert_eq!(seconds, 2.0);
    }

    #[test]
    fn test_travel_distance_uses_earlier_speed() {
        // 60 s at the first reading's speed, then 60 s at zero
        let input = log(&[HEADER_A, "{R} 0 | 100 | 0", "{R} 60000 | 0 | 0", "{R} 120000 | 50 | 0"]);
        let km = fold(&input, DateTimeWindow::unbounded(), TravelDistance::default());
        let expected = 100.0 * KMH_PER_IMPULSE / 60.0;
        assert!((km - expected).abs() < 1e-9, "got {km}, expected {expected}");
    }

    #[test]
    fn test_window_bounds_folds() {
        let input = log(&[
            HEADER_A,
            "{R} 0 | 10 | 0",
            "{R} 1000 | 20 | 0",
            "{R} 2000 | 30 | 0",
            "{R} 3000 | 40 | 0",
        ]);
        let window = DateTimeWindow::parse(Some("01.01.2024-08:00:01"), Some("01.01.2024-08:00:02"))
            .unwrap();
        let speed = fold(&input, window, AverageSpeed::default());
        assert!((speed - 25.0 * KMH_PER_IMPULSE).abs() < 1e-9);
        let seconds = fold(&input, window, TravelTime::default());
        assert_eq!(seconds, 1.0);
    }

    #[test]
    fn test_acceleration_rise_then_fall() {
        // Rise 0 -> 100 impulses over 10 s, fall back to 0 over 5 s
        let input = log(&[
            HEADER_A,
            "{R} 0 | 0 | 0",
            "{R} 5000 | 50 | 0",
            "{R} 10000 | 100 | 0",
            "{R} 15000 | 0 | 0",
        ]);
        let top = 100.0 * KMH_PER_IMPULSE / 3.6;
        let rise = fold(&input, DateTimeWindow::unbounded(), AverageAcceleration::new(true));
        assert!((rise - top / 10.0).abs() < 1e-9, "got {rise}");
        let fall = fold(&input, DateTimeWindow::unbounded(), AverageAcceleration::new(false));
        assert!((fall + top / 5.0).abs() < 1e-9, "got {fall}");
    }

    #[test]
    fn test_acceleration_plateau_extends_run() {
        // Rise for 2 s, hold for 2 s, then fall: the rising run spans 4 s
        let input = log(&[
            HEADER_A,
            "{R} 0 | 0 | 0",
            "{R} 2000 | 40 | 0",
            "{R} 4000 | 40 | 0",
            "{R} 6000 | 10 | 0",
        ]);
        let rise = fold(&input, DateTimeWindow::unbounded(), AverageAcceleration::new(true));
        let expected = 40.0 * KMH_PER_IMPULSE / 3.6 / 4.0;
        assert!((rise - expected).abs() < 1e-9, "got {rise}, expected {expected}");
    }

    #[test]
    fn test_acceleration_flat_prefix_moves_start() {
        // Speed holds at zero before rising: the run starts at the last zero
        let input = log(&[
            HEADER_A,
            "{R} 0 | 0 | 0",
            "{R} 5000 | 0 | 0",
            "{R} 7000 | 20 | 0",
        ]);
        let rise = fold(&input, DateTimeWindow::unbounded(), AverageAcceleration::new(true));
        let expected = 20.0 * KMH_PER_IMPULSE / 3.6 / 2.0;
        assert!((rise - expected).abs() < 1e-9, "got {rise}, expected {expected}");
    }

    #[test]
    fn test_acceleration_sessions_do_not_mix() {
        // Each session only rises; a new header closes the run
        let input = log(&[
            HEADER_A,
            "{R} 0 | 0 | 0",
            "{R} 1000 | 10 | 0",
            HEADER_B,
            "{R} 0 | 30 | 0",
            "{R} 1000 | 40 | 0",
        ]);
        let fall = fold(&input, DateTimeWindow::unbounded(), AverageAcceleration::new(false));
        assert_eq!(fall, 0.0);
        let rise = fold(&input, DateTimeWindow::unbounded(), AverageAcceleration::new(true));
        let expected = 10.0 * KMH_PER_IMPULSE / 3.6;
        assert!((rise - expected).abs() < 1e-9, "got {rise}");
    }

    #[test]
    fn test_acceleration_without_change_is_zero() {
        let input = log(&[HEADER_A, "{R} 0 | 5 | 0", "{R} 1000 | 5 | 0"]);
        assert_eq!(
            fold(&input, DateTimeWindow::unbounded(), AverageAcceleration::new(true)),
            0.0
        );
    }

    #[test]
    fn test_daily_travel_groups_by_header_date() {
        let input = log(&[
            HEADER_A,
            "{R} 0 | 10 | 0",
            "{R} 60000 | 10 | 0",
            "{H} 01.01.2024-18:00:00 ( 20 | 2100 | 1.0 | 12 )",
            "{R} 0 | 10 | 0",
            "{R} 30000 | 10 | 0",
            HEADER_B,
            "{R} 0 | 0 | 0",
        ]);
        let days = fold(&input, DateTimeWindow::unbounded(), DailyTravel::default());
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(days[0].travel_time_s, 90.0);
        assert!(days[0].travel_distance_km > 0.0);

        let yaml = serde_yaml::to_string(&days).unwrap();
        assert!(yaml.contains("date: 2024-01-01"), "{yaml}");
    }

    #[test]
    fn test_summary_matches_individual_folds() {
        let input = log(&[
            HEADER_A,
            "{R} 0 | 0 | 1023",
            "{R} 1000 | 30 | 900",
            "{R} 2000 | 10 | 950",
        ]);
        let window = DateTimeWindow::unbounded();
        let summary = fold(&input, window, SummaryFold::new(5.0));
        assert_eq!(summary.average_speed_kmh, fold(&input, window, AverageSpeed::default()));
        assert_eq!(summary.travel_time_s, fold(&input, window, TravelTime::default()));
        assert_eq!(summary.travel_distance_km, fold(&input, window, TravelDistance::default()));
        assert_eq!(
            summary.voltage_interval,
            fold(&input, window, VoltageIntervalFold::new(5.0))
        );
        assert!(summary.average_increase_acceleration > 0.0);
        assert!(summary.average_decrease_acceleration < 0.0);
    }
}
