// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Providers allow the engine to be hosted in different contexts by
//! allowing implementations of core services to be plugged in. A
//! controller process wants structured, asynchronous logging; a unit
//! test wants `println!` or a log it can inspect afterwards. If a
//! service doesn't have at least two obvious implementations, it
//! probably doesn't need to be a provider.

use core::fmt;
use core::fmt::Display;
use slog::Drain;

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the engine is running.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[derive(Clone, Copy)]
pub struct PrintlnLog;

impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        println!("{level} {msg}");
    }
}

/// Log through an [`slog::Logger`].
pub struct SlogLog {
    log: slog::Logger,
}

impl SlogLog {
    pub fn new(log: slog::Logger) -> Self {
        Self { log }
    }

    /// A terminal logger drained by a background thread.
    pub fn term() -> Self {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Self::new(slog::Logger::root(drain, slog::o!("component" => "ofvisor")))
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => slog::info!(self.log, "{}", msg),
            LogLevel::Warn => slog::warn!(self.log, "{}", msg),
            LogLevel::Error => slog::error!(self.log, "{}", msg),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_display() {
        assert_eq!(LogLevel::Note.to_string(), "[NOTE]");
        assert_eq!(LogLevel::Warn.to_string(), "[WARN]");
        assert_eq!(LogLevel::Error.to_string(), "[ERROR]");
    }

    #[test]
    fn slog_discard() {
        let log = SlogLog::new(slog::Logger::root(slog::Discard, slog::o!()));
        log.log(LogLevel::Error, "dropped on the floor");
    }

    #[test]
    fn slog_term_every_level() {
        let log = SlogLog::term();
        for level in [LogLevel::Note, LogLevel::Warn, LogLevel::Error] {
            log.log(level, "to the terminal");
        }
    }
}
