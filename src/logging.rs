//! Progress and diagnostic output on stderr through the `log` facade.

use chrono::Local;
use log::Level;
use log::LevelFilter;
use log::Log;
use log::Metadata;
use log::Record;
use std::io::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Writes `timestamp LEVEL message` lines to stderr
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(std::io::stderr().lock(), "{}", format_record(record.level(), record.args()));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn format_record(level: Level, message: &std::fmt::Arguments) -> String {
    format!("{} {:<5} {}", Local::now().format(TIMESTAMP_FORMAT), level, message)
}

/// Installs the stderr logger. A second call only changes the level.
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_err() {
        log::debug!("Logger already installed");
    }
    log::set_max_level(level);
}

/// Level for the command-line verbosity flags
pub fn level(verbose: bool, quiet: bool) -> LevelFilter {
    match (verbose, quiet) {
        (true, _) => LevelFilter::Debug,
        (false, true) => LevelFilter::Warn,
        (false, false) => LevelFilter::Info,
    }
}

/// Local wall-clock time for start and end banners
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
