//! Logging setup shared by the vehicle and surface executables
//!
//! Every record goes to the session log file. The console can be given a coarser level so that
//! per cycle records do not flood the terminal while still being archived.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use std::fmt::Arguments;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Levels applied to each log output.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level of the session log file.
    pub file_level: LevelFilter,

    /// Level of the console, must not be finer than `file_level`.
    pub console_level: LevelFilter,

    /// Per module caps, for example to silence a chatty dependency.
    pub module_levels: Vec<(String, LevelFilter)>,
}

/// Errors associated with initialising the logger.
#[derive(Debug, Error, PartialEq)]
pub enum LoggerInitError {
    #[error("Expected a file log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Console level `{console}` is finer than the file level `{file}`")]
    ConsoleFinerThanFile {
        console: LevelFilter,
        file: LevelFilter,
    },

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(String),

    #[error("The logger has already been initialised")]
    AlreadyInitialised,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LogConfig {
    /// Log everything at or above `level` to both outputs.
    pub fn new(level: LevelFilter) -> Self {
        Self {
            file_level: level,
            console_level: level,
            module_levels: Vec::new(),
        }
    }

    pub fn console(mut self, level: LevelFilter) -> Self {
        self.console_level = level;
        self
    }

    pub fn module(mut self, module: &str, level: LevelFilter) -> Self {
        self.module_levels.push((module.to_string(), level));
        self
    }

    /// Check the levels are usable.
    ///
    /// Session start and end banners are logged at info, so neither output may drop them.
    pub fn validate(&self) -> Result<(), LoggerInitError> {
        if self.file_level < Level::Info {
            return Err(LoggerInitError::InvalidMinLogLevel(self.file_level));
        }

        if self.console_level > self.file_level {
            return Err(LoggerInitError::ConsoleFinerThanFile {
                console: self.console_level,
                file: self.file_level,
            });
        }

        if self.console_level < Level::Info {
            return Err(LoggerInitError::InvalidMinLogLevel(self.console_level));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution with the same level on every output.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    logger_init_with(&LogConfig::new(min_level), session)
}

/// Initialise the logger for this execution.
///
/// Can only succeed once per process.
pub fn logger_init_with(
    config: &LogConfig,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    config.validate()?;

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(|e| LoggerInitError::LogFileInitError(e.to_string()))?;

    let mut root = fern::Dispatch::new().level(config.file_level);
    for (module, level) in config.module_levels.iter() {
        root = root.level_for(module.clone(), *level);
    }

    root.chain(
        fern::Dispatch::new()
            .level(config.console_level)
            .format(|out, message, record| {
                out.finish(format_args!("{}", format_record(message, record)))
            })
            .chain(std::io::stdout()),
    )
    .chain(
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!("{}", format_record(message, record)))
            })
            .chain(log_file),
    )
    .apply()
    .map_err(|_| LoggerInitError::AlreadyInitialised)?;

    info!("Logging initialised");
    if let Ok(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!(
        "    Log levels: file {:?}, console {:?}",
        config.file_level, config.console_level
    );
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Prefix a record with the session time and its level. Debug and trace records also carry
/// their module.
fn format_record(message: &Arguments, record: &Record) -> String {
    let stamp = format!(
        "[{:10.6} {}]",
        session::get_elapsed_seconds(),
        level_tag(record.level())
    );

    match record.level() {
        Level::Debug | Level::Trace => format!("{} {}: {}", stamp, record.target(), message),
        _ => format!("{} {}", stamp, message),
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
