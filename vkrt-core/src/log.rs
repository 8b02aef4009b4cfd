//! Small structured logger: a process-wide [`Logger`] guarded by a mutex,
//! [`LogCategory`] carrying a module name, and a throttle helper for
//! "logged (throttled)" capacity-exhaustion paths.

use std::collections::HashMap;
use std::fmt::{self, Arguments, Display};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

/// Logging verbosity, severe is the quietest.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum LogLevel {
    Severe,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Severe => "SEVERE",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Debug => "DEBUG",
        })
    }
}

/// Log category: a module name plus an optional sub-category, e.g.
/// `LogCategory::new("light_grid")` or `LogCategory::with_sub("devmem", "slab")`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LogCategory {
    name: &'static str,
    sub: Option<&'static str>,
}

impl LogCategory {
    pub const fn new(name: &'static str) -> Self {
        Self { name, sub: None }
    }

    pub const fn with_sub(name: &'static str, sub: &'static str) -> Self {
        Self { name, sub: Some(sub) }
    }
}

impl Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub {
            Some(sub) => write!(f, "{}({sub})", self.name),
            None => f.write_str(self.name),
        }
    }
}

struct LoggerState {
    max_level: LogLevel,
    sink: Vec<String>,
}

pub struct Logger {
    state: Mutex<LoggerState>,
}

impl Logger {
    const fn new() -> Self {
        Self {
            state: Mutex::new(LoggerState { max_level: LogLevel::Debug, sink: Vec::new() }),
        }
    }

    pub fn set_max_level(&self, level: LogLevel) {
        self.state.lock().max_level = level;
    }

    pub fn log_fmt(&self, category: LogCategory, level: LogLevel, args: Arguments<'_>) {
        let mut state = self.state.lock();
        if level > state.max_level {
            return;
        }
        let line = format!("[{level}] [{category}] {args}");
        eprintln!("{line}");
        state.sink.push(line);
    }

    /// Drains buffered lines; used by tests that assert on log content.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().sink)
    }
}

static LOGGER: OnceCell<Logger> = OnceCell::new();

pub fn logger() -> &'static Logger {
    LOGGER.get_or_init(Logger::new)
}

#[macro_export]
macro_rules! log_line {
    ($category:expr, $level:expr, $($arg:tt)*) => {
        $crate::log::logger().log_fmt($category, $level, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warning {
    ($category:expr, $($arg:tt)*) => {
        $crate::log_line!($category, $crate::log::LogLevel::Warning, $($arg)*);
    };
}

#[macro_export]
macro_rules! log_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::log_line!($category, $crate::log::LogLevel::Error, $($arg)*);
    };
}

#[macro_export]
macro_rules! log_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::log_line!($category, $crate::log::LogLevel::Info, $($arg)*);
    };
}

#[macro_export]
macro_rules! log_debug {
    ($category:expr, $($arg:tt)*) => {
        $crate::log_line!($category, $crate::log::LogLevel::Debug, $($arg)*);
    };
}

/// Throttles repeated log lines for the same key to at most once per
/// `min_interval`. Dropping a flood of "cell is full" messages every frame
/// would otherwise swamp the console.
pub struct LogThrottle {
    min_interval: Duration,
    last_seen: Mutex<HashMap<&'static str, Instant>>,
}

impl LogThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_seen: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if a log for `key` should be emitted right now.
    pub fn should_log(&self, key: &'static str, now: Instant) -> bool {
        let mut last_seen = self.last_seen.lock();
        match last_seen.get(key) {
            Some(last) if now.duration_since(*last) < self.min_interval => false,
            _ => {
                last_seen.insert(key, now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_suppresses_repeats_within_window() {
        let throttle = LogThrottle::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(throttle.should_log("cell_overflow", t0));
        assert!(!throttle.should_log("cell_overflow", t0 + Duration::from_secs(1)));
        assert!(throttle.should_log("cell_overflow", t0 + Duration::from_secs(11)));
    }

    #[test]
    fn throttle_keys_are_independent() {
        let throttle = LogThrottle::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(throttle.should_log("a", t0));
        assert!(throttle.should_log("b", t0));
    }
}
