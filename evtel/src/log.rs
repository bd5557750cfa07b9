// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Diagnostics of the library itself.
//!
//! Messages go through the `evtel_*!` macros and are written to stderr as
//! `LEVEL file:line - message` when their level passes the global filter. The filter defaults to
//! [`LevelFilter::Error`] and is set from `EVTEL_LOG_LEVEL` by `Client::configure`.

use std::{
    fmt,
    io::Write,
    str::FromStr,
    sync::atomic::{AtomicU8, Ordering},
};

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LevelFilter::Error as u8);

/// Most verbose level printed by the library
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
#[non_exhaustive]
pub enum LevelFilter {
    Off = 0,
    #[default]
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LevelFilter {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Warn,
            3 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

impl FromStr for LevelFilter {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ]
        .into_iter()
        .find(|filter| filter.to_string().eq_ignore_ascii_case(s.trim()))
        .ok_or("log level should be one of DEBUG, INFO, WARN, ERROR, OFF")
    }
}

impl fmt::Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LevelFilter::Off => "OFF",
            LevelFilter::Error => "ERROR",
            LevelFilter::Warn => "WARN",
            LevelFilter::Info => "INFO",
            LevelFilter::Debug => "DEBUG",
        })
    }
}

/// Severity of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl Level {
    /// True if messages of this level pass the global filter
    pub fn enabled(self) -> bool {
        self as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        })
    }
}

pub fn set_max_level(filter: LevelFilter) {
    MAX_LEVEL.store(filter as u8, Ordering::Relaxed)
}

pub fn max_level() -> LevelFilter {
    LevelFilter::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

#[doc(hidden)]
pub fn print_log(lvl: Level, log: fmt::Arguments, file: &str, line: u32) {
    let _ = writeln!(std::io::stderr().lock(), "{lvl} {file}:{line} - {log}");
}

#[doc(hidden)]
pub fn capture_log(lvl: Level, log: fmt::Arguments, file: &str, line: u32) {
    #[cfg(feature = "test-utils")]
    test_logger::record(lvl, log);
    let _ = (lvl, log, file, line);
}

/// Prints an application log line at info level, regardless of the library filter.
#[track_caller]
pub fn print_event_line(line: &str) {
    let loc = std::panic::Location::caller();
    print_log(Level::Info, format_args!("{line}"), loc.file(), loc.line());
    capture_log(Level::Info, format_args!("{line}"), loc.file(), loc.line());
}

/// Wraps a thread body so it logs to the spawning thread's test logger, if any.
///
/// Without the `test-utils` feature this returns `f` unchanged.
pub fn with_local_logger<F: FnOnce() -> R, R>(f: F) -> impl FnOnce() -> R {
    #[cfg(feature = "test-utils")]
    {
        test_logger::with_local_logger(f)
    }
    #[cfg(not(feature = "test-utils"))]
    {
        f
    }
}

#[cfg(feature = "test-utils")]
pub mod test_logger {
    //! Per-thread log capture for tests.
    //!
    //! ```
    //! let _guard = evtel::log::test_logger::activate_test_logger();
    //! evtel::evtel_debug!("flushing {} events", 3);
    //! let logs = evtel::log::test_logger::take_test_logs().unwrap();
    //! assert_eq!(logs[0].1, "flushing 3 events");
    //! ```
    //!
    //! Messages are captured whatever the global filter. Threads spawned by the test only
    //! report to the same capture when their body is wrapped in
    //! [`with_local_logger`](crate::log::with_local_logger).
    use std::{
        cell::RefCell,
        fmt,
        sync::{Arc, Mutex, PoisonError},
    };

    use super::Level;

    type Capture = Arc<Mutex<Vec<(Level, String)>>>;

    thread_local! {
        static CAPTURE: RefCell<Option<Capture>> = const { RefCell::new(None) };
    }

    /// Restores the previous capture of the thread when dropped
    pub struct LoggerGuard {
        prev: Option<Capture>,
    }

    impl Drop for LoggerGuard {
        fn drop(&mut self) {
            let prev = self.prev.take();
            let _ = CAPTURE.try_with(|c| c.replace(prev));
        }
    }

    fn install(capture: Option<Capture>) -> LoggerGuard {
        LoggerGuard {
            prev: CAPTURE.with(|c| c.replace(capture)),
        }
    }

    fn current() -> Option<Capture> {
        CAPTURE.try_with(|c| c.borrow().clone()).ok().flatten()
    }

    pub(super) fn record(lvl: Level, log: fmt::Arguments) {
        if let Some(capture) = current() {
            capture
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((lvl, log.to_string()));
        }
    }

    /// Starts capturing the logs of the current thread
    pub fn activate_test_logger() -> LoggerGuard {
        install(Some(Capture::default()))
    }

    /// Drains the captured logs, `None` if no capture is active on this thread
    pub fn take_test_logs() -> Option<Vec<(Level, String)>> {
        current().map(|capture| {
            std::mem::take(&mut *capture.lock().unwrap_or_else(PoisonError::into_inner))
        })
    }

    pub fn with_local_logger<F: FnOnce() -> R, R>(f: F) -> impl FnOnce() -> R {
        let capture = current();
        move || {
            let _guard = install(capture);
            f()
        }
    }
}

#[macro_export]
macro_rules! evtel_debug {
    ($($arg:tt)+) => {
        $crate::evtel_log!($crate::log::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! evtel_info {
    ($($arg:tt)+) => {
        $crate::evtel_log!($crate::log::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! evtel_warn {
    ($($arg:tt)+) => {
        $crate::evtel_log!($crate::log::Level::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! evtel_error {
    ($($arg:tt)+) => {
        $crate::evtel_log!($crate::log::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! evtel_log {
    ($lvl:expr, $($arg:tt)+) => {{
        let lvl: $crate::log::Level = $lvl;
        let loc = ::std::panic::Location::caller();
        if lvl.enabled() {
            $crate::log::print_log(lvl, format_args!($($arg)+), loc.file(), loc.line());
        }
        $crate::log::capture_log(lvl, format_args!($($arg)+), loc.file(), loc.line());
    }};
}
