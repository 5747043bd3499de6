use std::io::{self, IsTerminal, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use nu_ansi_term::Color;

/// Verbosity of console diagnostics, from `--verbosity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, clap::ValueEnum)]
pub enum Verbosity {
    #[value(alias = "q")]
    Quiet,
    #[value(alias = "m")]
    Minimal,
    #[default]
    #[value(alias = "n")]
    Normal,
    #[value(alias = "d")]
    Detailed,
    #[value(alias = "diag")]
    Diagnostic,
}

impl Verbosity {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Error,
            Verbosity::Minimal => LevelFilter::Warn,
            Verbosity::Normal => LevelFilter::Info,
            Verbosity::Detailed => LevelFilter::Debug,
            Verbosity::Diagnostic => LevelFilter::Trace,
        }
    }
}

/// Stderr logger behind the `log` facade. Warnings and errors carry the same
/// `ERR` prefix as per-path failure lines so interleaved output stays aligned.
pub struct ConsoleLogger {
    max_level: LevelFilter,
    color: bool,
}

impl ConsoleLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        ConsoleLogger {
            max_level: verbosity.level_filter(),
            color: io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    /// Install as the process-wide logger. Only the binary entry point calls
    /// this; library code sticks to the `log` macros.
    pub fn install(verbosity: Verbosity) {
        let logger = Box::new(ConsoleLogger::new(verbosity));
        if log::set_boxed_logger(logger).is_ok() {
            log::set_max_level(verbosity.level_filter());
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut stderr = io::stderr().lock();
        let result = match record.level() {
            Level::Error | Level::Warn => {
                if self.color {
                    writeln!(stderr, "{} {}", Color::Red.paint("ERR"), record.args())
                } else {
                    writeln!(stderr, "ERR {}", record.args())
                }
            }
            Level::Info => writeln!(stderr, "{}", record.args()),
            Level::Debug | Level::Trace => {
                writeln!(stderr, "{}: {}", record.target(), record.args())
            }
        };
        // A broken stderr pipe is not worth dying for.
        let _ = result;
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
