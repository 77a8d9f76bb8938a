//! MARP Library
//!
//! A Rust library for reading the text logs written by a bicycle trip
//! computer: session headers (`{H}`) followed by raw wheel-sensor readings
//! (`{R}`). Files are processed as streams, one line at a time, so logs far
//! larger than memory can be validated, reduced, split and summarized.
//!
//! # Features
//!
//! - **`csv`** (default): Enable CSV export of derived readings
//! - **`cli`** (default): Build the `marp` command-line binary
//! - **`json`**: Enable JSON export of metric summaries
//!
//! # Quick Start
//!
//! Validate a log and compute its average speed:
//! ```rust,no_run
//! use marp::{metrics, validate_file, MetricOptions, ReadableFile, MAXIMAL_FILE_LINES};
//!
//! let file = ReadableFile::open("ride.txt", MAXIMAL_FILE_LINES).unwrap();
//! if validate_file(&file).unwrap().passed() {
//!     let speed = metrics::average_speed(&file, &MetricOptions::default()).unwrap();
//!     println!("Average speed: {:.2} km/h", speed);
//! }
//! ```
//!
//! Walk sessions inside a time window:
//! ```rust,no_run
//! use marp::{DateTimeWindow, ParseMode, ReadableFile, SessionEvent, MAXIMAL_FILE_LINES};
//!
//! let file = ReadableFile::open("ride.txt", MAXIMAL_FILE_LINES).unwrap();
//! let window = DateTimeWindow::parse(Some("01.06.2024"), Some("02.06.2024")).unwrap();
//! for event in file.sessions(ParseMode::Fix).unwrap() {
//!     if let SessionEvent::Reading(timed) = event.unwrap() {
//!         if window.contains(timed.absolute_time) {
//!             println!("{} -> {:?}", timed.absolute_time, timed.reading);
//!         }
//!     }
//! }
//! ```
//!
//! # Public API
//!
//! ## Parsing
//! - [`ReadableFile`] - Existence, encoding and size gate for an input file
//! - [`LineEvents`] - Lazy per-line classification
//! - [`SessionEvents`] - Readings associated with their governing header
//! - [`parse_header`], [`parse_reading`], [`parse_counted_reading`] - Line grammar
//!
//! ## Validation and Transformation
//! - [`validate_pattern`], [`validate_time`], [`validate_file`] - Full-file checks
//! - [`reduce_file`] - Collapse duplicated headers
//! - [`split_file`] - Split at header boundaries
//!
//! ## Metrics
//! - [`metrics::voltage_interval`], [`metrics::average_acceleration`],
//!   [`metrics::average_speed`], [`metrics::travel_time`],
//!   [`metrics::travel_distance`], [`metrics::daily_travel`], [`metrics::summary`]
//! - [`Fold`] and [`run_fold`] - Build custom single-pass metrics
//!
//! ## Conversion Utilities
//! - [`speed_kmh`] - Impulse count to km/h
//! - [`voltage_v`] - ADC value to volts
//! - [`acceleration`], [`travel_distance`], [`travel_time`] - Reading-pair formulas

pub mod config;
pub mod conversion;
pub mod display;
pub mod error;
pub mod export;
pub mod filters;
pub mod metrics;
pub mod parser;
pub mod reduce;
pub mod split;
pub mod types;
pub mod validation;

// Re-export everything from modules for convenience.
// `metrics` is left out: its file-level functions share names with the
// conversion formulas and are reached as `marp::metrics::*`.
#[allow(ambiguous_glob_reexports)]
pub use config::*;
#[allow(ambiguous_glob_reexports)]
pub use conversion::*;
#[allow(ambiguous_glob_reexports)]
pub use display::*;
#[allow(ambiguous_glob_reexports)]
pub use error::*;
#[allow(ambiguous_glob_reexports)]
pub use export::*;
#[allow(ambiguous_glob_reexports)]
pub use filters::*;
pub use metrics::{
    run_fold, DayTravel, Fold, MetricOptions, Summary, SummaryFold, VoltageInterval,
};
#[allow(ambiguous_glob_reexports)]
pub use parser::*;
#[allow(ambiguous_glob_reexports)]
pub use reduce::*;
#[allow(ambiguous_glob_reexports)]
pub use split::*;
#[allow(ambiguous_glob_reexports)]
pub use types::*;
#[allow(ambiguous_glob_reexports)]
pub use validation::*;
