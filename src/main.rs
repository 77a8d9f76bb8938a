use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use glob::glob;
use marp::metrics::{self, MetricOptions};
use marp::{
    reduce_file, split_file, validate_pattern, validate_time, Config, CountedReading,
    DateTimeWindow, DisplayEntry, DisplayStyle, Enumerated, MarpError, ParseMode, ReadableFile,
    SessionEvent, SplitTarget, COUNTED_READING_PATTERN, HEADER_PATTERN, READING_PATTERN,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

/// Expand glob patterns; plain paths are passed through for `ReadableFile` to check
fn expand_input_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if !(pattern.contains('*') || pattern.contains('?')) {
            paths.push(PathBuf::from(pattern));
            continue;
        }

        let matched = glob(pattern)
            .with_context(|| format!("Invalid glob pattern '{}'", pattern))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Error expanding glob pattern '{}'", pattern))?;
        if matched.is_empty() {
            warn!("Pattern '{}' matched no files", pattern);
        }
        paths.extend(matched.into_iter().filter(|p| p.is_file()));
    }
    Ok(paths)
}

fn input_arg() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .help("Log files to process, supports globbing")
        .required(true)
        .num_args(1..)
        .value_name("FILE")
}

fn window_args() -> [Arg; 2] {
    [
        Arg::new("from")
            .long("from")
            .help("Start of the time window (dd.mm.yyyy or dd.mm.yyyy-HH:MM:SS)")
            .value_name("DATETIME"),
        Arg::new("to")
            .long("to")
            .help("End of the time window; a bare date includes the whole day")
            .value_name("DATETIME"),
    ]
}

fn accuracy_arg() -> Arg {
    Arg::new("accuracy")
        .long("accuracy")
        .help("Decimal places for calculated values")
        .value_parser(clap::value_parser!(usize))
        .default_value("2")
        .value_name("N")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
}

fn build_command() -> Command {
    let show = Command::new("show")
        .about("Print headers and readings")
        .arg(input_arg())
        .args(window_args())
        .arg(accuracy_arg())
        .arg(flag("headers", "Print headers"))
        .arg(flag("readings", "Print readings"))
        .arg(flag("calculated", "Print readings converted to speed and voltage"))
        .arg(flag("raw", "Print entries as log lines"))
        .arg(flag("enumerate", "Number printed entries"))
        .arg(
            Arg::new("first")
                .long("first")
                .help("Print only the first N entries")
                .value_parser(clap::value_parser!(usize))
                .conflicts_with("last")
                .value_name("N"),
        )
        .arg(
            Arg::new("last")
                .long("last")
                .help("Print only the last N entries")
                .value_parser(clap::value_parser!(usize))
                .value_name("N"),
        );
    #[cfg(feature = "csv")]
    let show = show.arg(
        Arg::new("csv")
            .long("csv")
            .help("Also export calculated readings in the window to a CSV file")
            .value_name("PATH"),
    );

    let calc = Command::new("calc")
        .about("Calculate metrics, all of them when none is selected")
        .arg(input_arg())
        .args(window_args())
        .arg(accuracy_arg())
        .arg(flag("voltage", "Voltage interval"))
        .arg(flag("acceleration-increase", "Average positive acceleration"))
        .arg(flag("acceleration-decrease", "Average negative acceleration"))
        .arg(flag("speed", "Average speed"))
        .arg(flag("time", "Travel time"))
        .arg(flag("distance", "Travel distance"))
        .arg(flag("daily", "Travel time and distance per day"));
    #[cfg(feature = "json")]
    let calc = calc.arg(
        Arg::new("json")
            .long("json")
            .help("Write the metric summary of the first input to a JSON file")
            .value_name("PATH"),
    );

    Command::new("marp")
        .version(VERSION)
        .about("Validate, reduce, split and analyze bicycle computer logs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("YAML configuration file, created with defaults when missing")
                .value_name("PATH")
                .global(true),
        )
        .arg(flag("debug", "Enable debug output").global(true))
        .arg(flag("fix", "Skip offending lines instead of stopping").global(true))
        .subcommand(show)
        .subcommand(
            Command::new("check")
                .about("Validate line patterns and time order")
                .arg(input_arg())
                .arg(flag("pattern", "Run only the pattern check"))
                .arg(flag("time", "Run only the time check")),
        )
        .subcommand(
            Command::new("reduce")
                .about("Collapse duplicated headers into <name>_reduced.txt")
                .arg(input_arg())
                .arg(flag("unchecked", "Skip validation before reducing")),
        )
        .subcommand(calc)
        .subcommand(
            Command::new("split")
                .about("Split files at header boundaries into <name>_part_<n>.txt")
                .arg(input_arg())
                .arg(
                    Arg::new("parts")
                        .long("parts")
                        .help("Number of parts")
                        .value_parser(clap::value_parser!(usize))
                        .value_name("N"),
                )
                .arg(
                    Arg::new("lines")
                        .long("lines")
                        .help("Lines per part")
                        .value_parser(clap::value_parser!(usize))
                        .value_name("N"),
                )
                .group(
                    clap::ArgGroup::new("target")
                        .args(["parts", "lines"])
                        .required(true),
                ),
        )
        .subcommand(Command::new("templates").about("Print the line templates"))
}

fn init_logging(debug: bool) {
    let default_level = if debug { "marp=debug" } else { "marp=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    match matches.get_one::<String>("config") {
        Some(path) => Config::load_or_create(Path::new(path))
            .with_context(|| format!("Failed to load config {}", path)),
        None => {
            let path = Config::default_path();
            if path.exists() {
                Ok(Config::load(&path)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn window_from(matches: &ArgMatches) -> Result<DateTimeWindow> {
    let from = matches.get_one::<String>("from").map(String::as_str);
    let to = matches.get_one::<String>("to").map(String::as_str);
    Ok(DateTimeWindow::parse(from, to)?)
}

fn report_error(path: &Path, error: &anyhow::Error) {
    match error.downcast_ref::<MarpError>() {
        Some(marp_error) => eprintln!(
            "Error [{}] in {}: {}",
            marp_error.code(),
            path.display(),
            marp_error
        ),
        None => eprintln!("Error in {}: {:#}", path.display(), error),
    }
}

fn main() -> Result<()> {
    let matches = build_command().get_matches();
    init_logging(matches.get_flag("debug"));

    let config = load_config(&matches)?;
    let mode = if matches.get_flag("fix") {
        ParseMode::Fix
    } else {
        ParseMode::Strict
    };
    debug!("Using {:?} mode with {:?}", mode, config);

    let (name, sub) = match matches.subcommand() {
        Some(subcommand) => subcommand,
        None => {
            build_command().print_help()?;
            return Ok(());
        }
    };

    if name == "templates" {
        println!("Header: {}", HEADER_PATTERN);
        println!("Reading: {}", READING_PATTERN);
        println!("Counted reading: {}", COUNTED_READING_PATTERN);
        return Ok(());
    }

    let patterns: Vec<String> = sub
        .get_many::<String>("input")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let inputs = expand_input_paths(&patterns)?;
    if inputs.is_empty() {
        eprintln!("Error: No input files found for patterns {:?}", patterns);
        std::process::exit(1);
    }

    let mut failed = 0;
    for (index, path) in inputs.iter().enumerate() {
        if index > 0 {
            println!();
        }
        if inputs.len() > 1 {
            println!("== {} ==", path.display());
        }

        let outcome = ReadableFile::open(path, config.max_file_lines)
            .map_err(anyhow::Error::from)
            .and_then(|file| match name {
                "show" => run_show(&file, sub, &config, mode),
                "check" => run_check(&file, sub),
                "reduce" => run_reduce(&file, sub),
                "calc" => {
                    let passed = run_calc(&file, sub, &config, mode)?;
                    // One summary file per run, taken from the first input
                    #[cfg(feature = "json")]
                    if index == 0 {
                        write_summary_json(&file, sub, &config, mode)?;
                    }
                    Ok(passed)
                }
                "split" => run_split(&file, sub),
                other => Err(anyhow::anyhow!("Unknown command '{}'", other)),
            });

        match outcome {
            Ok(true) => {}
            Ok(false) => failed += 1,
            Err(e) => {
                report_error(path, &e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_show(file: &ReadableFile, sub: &ArgMatches, config: &Config, mode: ParseMode) -> Result<bool> {
    let window = window_from(sub)?;
    let show_headers = sub.get_flag("headers");
    let calculated = sub.get_flag("calculated");
    let show_readings = sub.get_flag("readings") || calculated || !show_headers;
    let style = DisplayStyle {
        raw: sub.get_flag("raw"),
        decimal_places: sub.get_one::<usize>("accuracy").copied().unwrap_or(2),
        normal_speed_interval: Some(config.normal_speed_interval),
        normal_voltage_interval: Some(config.normal_voltage_interval),
    };

    let mut failure: Option<MarpError> = None;
    {
        let mut sessions = file.sessions(mode)?;
        let rendered = std::iter::from_fn(|| loop {
            match sessions.next()? {
                Err(e) => {
                    failure = Some(e);
                    return None;
                }
                Ok(SessionEvent::Header { header, .. }) => {
                    let at = header.datetime();
                    if window.is_after(at) {
                        return None;
                    }
                    if show_headers && (show_readings || !window.is_before(at)) {
                        return Some(DisplayEntry::Header(&header).render(&style));
                    }
                }
                Ok(SessionEvent::Reading(timed)) => {
                    if !show_readings || window.is_before(timed.absolute_time) {
                        continue;
                    }
                    if window.is_after(timed.absolute_time) {
                        return None;
                    }
                    if calculated {
                        let counted = CountedReading::new(&timed.reading, &timed.header);
                        return Some(DisplayEntry::Derived(&counted).render(&style));
                    }
                    return Some(DisplayEntry::Raw(&timed.reading).render(&style));
                }
            }
        });
        let numbered = Enumerated::new(rendered, sub.get_flag("enumerate"));

        match (sub.get_one::<usize>("first"), sub.get_one::<usize>("last")) {
            (Some(&first), _) => numbered.take(first).for_each(|line| println!("{}", line)),
            (None, Some(&last)) => {
                let mut tail = VecDeque::with_capacity(last);
                for line in numbered {
                    if tail.len() == last {
                        tail.pop_front();
                    }
                    if last > 0 {
                        tail.push_back(line);
                    }
                }
                tail.iter().for_each(|line| println!("{}", line));
            }
            (None, None) => numbered.for_each(|line| println!("{}", line)),
        }
    }
    if let Some(e) = failure {
        return Err(e.into());
    }

    #[cfg(feature = "csv")]
    if let Some(csv_path) = sub.get_one::<String>("csv") {
        let rows = marp::export_counted_csv(file, &window, mode, Path::new(csv_path))?;
        println!("Exported {} reading(s) to {}", rows, csv_path);
    }

    Ok(true)
}

fn run_check(file: &ReadableFile, sub: &ArgMatches) -> Result<bool> {
    let only_pattern = sub.get_flag("pattern");
    let only_time = sub.get_flag("time");
    let mut passed = true;

    if only_pattern || !only_time {
        passed &= validate_pattern(file)?.passed();
    }
    if only_time || !only_pattern {
        passed &= validate_time(file)?.passed();
    }
    Ok(passed)
}

fn run_reduce(file: &ReadableFile, sub: &ArgMatches) -> Result<bool> {
    let output = reduce_file(file, !sub.get_flag("unchecked"))?;
    println!("Reduced file written to {}", output.display());
    Ok(true)
}

fn run_split(file: &ReadableFile, sub: &ArgMatches) -> Result<bool> {
    let target = match (sub.get_one::<usize>("parts"), sub.get_one::<usize>("lines")) {
        (Some(&parts), _) => SplitTarget::Parts(parts),
        (None, Some(&lines)) => SplitTarget::Lines(lines),
        (None, None) => anyhow::bail!("Either --parts or --lines is required"),
    };
    let report = split_file(file, target)?;
    for part in &report.parts {
        println!("{}", part.display());
    }
    Ok(true)
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, total % 3600 / 60, total % 60)
}

fn run_calc(
    file: &ReadableFile,
    sub: &ArgMatches,
    config: &Config,
    mode: ParseMode,
) -> Result<bool> {
    let options = MetricOptions::new(window_from(sub)?, mode);
    let places = sub.get_one::<usize>("accuracy").copied().unwrap_or(2);
    let threshold = config.minimal_voltage_search;

    let selected = [
        "voltage",
        "acceleration-increase",
        "acceleration-decrease",
        "speed",
        "time",
        "distance",
        "daily",
    ]
    .iter()
    .any(|name| sub.get_flag(name));

    if !selected {
        let summary = metrics::summary(file, &options, threshold)?;
        print_voltage(summary.voltage_interval, places);
        println!("Average increase acceleration: {:.*} m/s^2", places, summary.average_increase_acceleration);
        println!("Average decrease acceleration: {:.*} m/s^2", places, summary.average_decrease_acceleration);
        println!("Average speed: {:.*} km/h", places, summary.average_speed_kmh);
        println!(
            "Travel time: {} ({:.*} s)",
            format_duration(summary.travel_time_s),
            places,
            summary.travel_time_s
        );
        println!("Travel distance: {:.*} km", places, summary.travel_distance_km);
        return Ok(true);
    }

    if sub.get_flag("voltage") {
        print_voltage(metrics::voltage_interval(file, &options, threshold)?, places);
    }
    if sub.get_flag("acceleration-increase") {
        let value = metrics::average_acceleration(file, &options, true)?;
        println!("Average increase acceleration: {:.*} m/s^2", places, value);
    }
    if sub.get_flag("acceleration-decrease") {
        let value = metrics::average_acceleration(file, &options, false)?;
        println!("Average decrease acceleration: {:.*} m/s^2", places, value);
    }
    if sub.get_flag("speed") {
        let value = metrics::average_speed(file, &options)?;
        println!("Average speed: {:.*} km/h", places, value);
    }
    if sub.get_flag("time") {
        let value = metrics::travel_time(file, &options)?;
        println!("Travel time: {} ({:.*} s)", format_duration(value), places, value);
    }
    if sub.get_flag("distance") {
        let value = metrics::travel_distance(file, &options)?;
        println!("Travel distance: {:.*} km", places, value);
    }
    if sub.get_flag("daily") {
        let days = metrics::daily_travel(file, &options)?;
        if days.is_empty() {
            println!("No travel recorded in the requested window");
        }
        for day in days {
            println!(
                "{}: {} ({:.*} km)",
                day.date.format("%d.%m.%Y"),
                format_duration(day.travel_time_s),
                places,
                day.travel_distance_km
            );
        }
    }

    Ok(true)
}

#[cfg(feature = "json")]
fn write_summary_json(
    file: &ReadableFile,
    sub: &ArgMatches,
    config: &Config,
    mode: ParseMode,
) -> Result<()> {
    let Some(path) = sub.get_one::<String>("json") else {
        return Ok(());
    };
    let options = MetricOptions::new(window_from(sub)?, mode);
    let summary = metrics::summary(file, &options, config.minimal_voltage_search)?;
    marp::export_summary_json(&summary, Path::new(path))?;
    println!("Summary written to {}", path);
    Ok(())
}

fn print_voltage(interval: Option<marp::VoltageInterval>, places: usize) {
    match interval {
        Some(interval) => println!(
            "Voltage interval: {:.*} V .. {:.*} V",
            places, interval.min, places, interval.max
        ),
        None => println!("Voltage interval: no readings above the search threshold"),
    }
}
