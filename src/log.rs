//! Program logging.
//!
//! Messages go to the terminal (warnings and errors on stderr, everything else on stdout) and,
//! for simulation runs, to a pair of log files in the output folder. Hourly results are logged at
//! `debug` level and yearly summaries at `info` level, so the default level gives one line per
//! simulated year.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{Level, LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// Set once the global logger has been installed
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The environment variable used to override the log level
pub const LOG_LEVEL_ENV_VAR: &str = "GRIDBALANCE_LOG_LEVEL";

/// The log level used if neither the environment nor `settings.toml` specifies one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file for messages about the ordinary operation of a run
pub const LOG_INFO_FILE_NAME: &str = "gridbalance_info.log";

/// Log file for warnings and errors
pub const LOG_ERROR_FILE_NAME: &str = "gridbalance_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Install the program logger.
///
/// The level is taken from the `GRIDBALANCE_LOG_LEVEL` environment variable if set, otherwise
/// from `settings.toml`, otherwise [`DEFAULT_LOG_LEVEL`]. Recognised levels are `off`, `error`,
/// `warn`, `info`, `debug` and `trace` (in any case).
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_file_dir`: Folder in which to create log files. No files are written if `None`.
pub fn init(log_level_from_settings: Option<&str>, log_file_dir: Option<&Path>) -> Result<()> {
    let level = resolve_log_level(log_level_from_settings)?;

    let mut dispatch = terminal_dispatch(level);
    if let Some(dir) = log_file_dir {
        dispatch = dispatch.chain(file_dispatch(dir, level)?);
    }

    dispatch.apply().context("Logger already initialised")?;
    let _ = LOGGER_INIT.set(());

    Ok(())
}

/// Pick the log level from the environment, then settings, then the default
fn resolve_log_level(log_level_from_settings: Option<&str>) -> Result<LevelFilter> {
    match env::var(LOG_LEVEL_ENV_VAR) {
        Ok(level) => parse_log_level(&level),
        Err(_) => parse_log_level(log_level_from_settings.unwrap_or(DEFAULT_LOG_LEVEL)),
    }
}

/// Convert a log level string to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Whether a message belongs on stderr (and in the error log)
fn is_problem(level: Level) -> bool {
    level <= Level::Warn
}

/// Logging to stdout and stderr, coloured when writing to a terminal
fn terminal_dispatch(level: LevelFilter) -> Dispatch {
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let colour_stdout = std::io::stdout().is_terminal().then_some(colours);
    let colour_stderr = std::io::stderr().is_terminal().then_some(colours);

    Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| !is_problem(metadata.level()))
                .format(move |out, message, record| {
                    write_record(out, message, record, colour_stdout.as_ref());
                })
                .level(level)
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .filter(|metadata| is_problem(metadata.level()))
                .format(move |out, message, record| {
                    write_record(out, message, record, colour_stderr.as_ref());
                })
                .level(level)
                .chain(std::io::stderr()),
        )
}

/// Logging to the info and error files in `dir`.
///
/// The info file always records at least `info` level, whatever the terminal shows, and the
/// error file always records warnings and errors.
fn file_dispatch(dir: &Path, level: LevelFilter) -> Result<Dispatch> {
    let open = |file_name: &str| -> Result<File> {
        let file_path = dir.join(file_name);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .with_context(|| format!("Could not create log file {}", file_path.display()))
    };

    Ok(Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| !is_problem(metadata.level()))
                .format(|out, message, record| write_record(out, message, record, None))
                .level(level.max(LevelFilter::Info))
                .chain(open(LOG_INFO_FILE_NAME)?),
        )
        .chain(
            Dispatch::new()
                .format(|out, message, record| write_record(out, message, record, None))
                .level(LevelFilter::Warn)
                .chain(open(LOG_ERROR_FILE_NAME)?),
        ))
}

/// Format a log record as `[HH:MM:SS LEVEL target] message`
fn write_record(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    match colours {
        Some(colours) => write_line(out, colours.color(record.level()), record.target(), message),
        None => write_line(out, record.level(), record.target(), message),
    }
}

fn write_line<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");
    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}
