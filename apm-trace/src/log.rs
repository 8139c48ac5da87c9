// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt::{self, Display},
    mem,
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
};

static MAX_LOG_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Error as usize);

/// Sets the most verbose level that will be printed
pub fn set_max_level(lvl: LevelFilter) {
    MAX_LOG_LEVEL.store(lvl as usize, Ordering::Relaxed)
}

pub fn max_level() -> LevelFilter {
    unsafe { mem::transmute(MAX_LOG_LEVEL.load(Ordering::Relaxed)) }
}

#[repr(usize)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[non_exhaustive]
/// The level at which the agent will log
pub enum LevelFilter {
    Off,
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

impl FromStr for LevelFilter {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("debug") {
            Ok(LevelFilter::Debug)
        } else if s.eq_ignore_ascii_case("info") {
            Ok(LevelFilter::Info)
        } else if s.eq_ignore_ascii_case("warn") {
            Ok(LevelFilter::Warn)
        } else if s.eq_ignore_ascii_case("error") {
            Ok(LevelFilter::Error)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(LevelFilter::Off)
        } else {
            Err("log level filter should be one of DEBUG, INFO, WARN, ERROR, OFF")
        }
    }
}

impl Display for LevelFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filter = match self {
            LevelFilter::Debug => "DEBUG",
            LevelFilter::Info => "INFO",
            LevelFilter::Warn => "WARN",
            LevelFilter::Error => "ERROR",
            LevelFilter::Off => "OFF",
        };

        write!(f, "{filter}")
    }
}

#[repr(usize)]
#[derive(Copy, Debug, Hash, PartialEq)]
pub enum Level {
    Error = 1, // this value must match with LogLevelFilter::Error
    Warn,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };

        write!(f, "{level}")
    }
}

impl Clone for Level {
    #[inline]
    fn clone(&self) -> Level {
        *self
    }
}

impl PartialEq<LevelFilter> for Level {
    #[inline]
    fn eq(&self, other: &LevelFilter) -> bool {
        (*self as usize) == (*other as usize)
    }
}

impl PartialOrd<LevelFilter> for Level {
    #[inline]
    fn partial_cmp(&self, other: &LevelFilter) -> Option<std::cmp::Ordering> {
        Some((*self as usize).cmp(&(*other as usize)))
    }

    #[inline]
    fn lt(&self, other: &LevelFilter) -> bool {
        (*self as usize) < *other as usize
    }

    #[inline]
    fn le(&self, other: &LevelFilter) -> bool {
        *self as usize <= *other as usize
    }

    #[inline]
    fn gt(&self, other: &LevelFilter) -> bool {
        *self as usize > *other as usize
    }

    #[inline]
    fn ge(&self, other: &LevelFilter) -> bool {
        *self as usize >= *other as usize
    }
}

#[cfg(feature = "test-utils")]
pub mod test_logger {
    //! Thread local logger that tests use to assert on emitted logs
    //!
    //! Capture starts with `activate_test_logger` and stops when the guard drops
    //!
    //! ```no_run
    //! let _log_guard = apm_trace::log::test_logger::activate_test_logger();
    //! // whatever is logged by the apm_(level)! macros is stored, regardless of max_level
    //! apm_trace::apm_warn!("bad argument {}", "BucketRate");
    //! let logs = apm_trace::log::test_logger::take_test_logs().unwrap();
    //! // logs contains (Warn, "bad argument BucketRate")
    //!
    //! // worker threads spawned from the test only see the logger if the spawned
    //! // closure is wrapped by `with_local_logger`
    //! std::thread::spawn(apm_trace::log::with_local_logger(|| {
    //!   apm_trace::apm_debug!("sweep");
    //! })).join();
    //! ```
    use std::{cell::RefCell, sync::Arc};

    #[derive(Default)]
    struct TestLogger(std::sync::Mutex<Vec<(crate::log::Level, String)>>);

    pub fn print_log(lvl: crate::log::Level, log: std::fmt::Arguments, _file: &str, _line: u32) {
        let _ = LOCAL_LOGGER.try_with(|l| {
            if let Some(l) = &*l.borrow() {
                l.0.lock().unwrap().push((lvl, log.to_string()))
            }
        });
    }

    thread_local! {
        static LOCAL_LOGGER: RefCell<Option<Arc<TestLogger>>> = RefCell::new(None);
    }

    pub fn with_local_logger<F: FnOnce() -> R, R>(f: F) -> impl FnOnce() -> R {
        let logger = LOCAL_LOGGER.try_with(|l| l.borrow().clone()).ok().flatten();
        move || {
            let _guard = LoggerGuard {
                prev: LOCAL_LOGGER.replace(logger),
            };
            f()
        }
    }

    pub struct LoggerGuard {
        prev: Option<Arc<TestLogger>>,
    }

    impl Drop for LoggerGuard {
        fn drop(&mut self) {
            LOCAL_LOGGER.set(self.prev.take());
        }
    }

    pub fn activate_test_logger() -> LoggerGuard {
        let prev = LOCAL_LOGGER.replace(Some(Arc::new(TestLogger::default())));
        LoggerGuard { prev }
    }

    pub fn take_test_logs() -> Option<Vec<(crate::log::Level, String)>> {
        use std::ops::DerefMut;

        LOCAL_LOGGER
            .try_with(|l| {
                l.borrow()
                    .as_deref()
                    .map(|l| std::mem::take(l.0.lock().unwrap().deref_mut()))
            })
            .ok()
            .flatten()
    }
}

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

pub fn print_log(lvl: Level, log: fmt::Arguments, file: &str, line: u32) {
    if lvl == LevelFilter::Error {
        eprintln!("\x1b[91m{lvl}\x1b[0m {file}:{line} - {log}");
    } else {
        println!("\x1b[93m{lvl}\x1b[0m {file}:{line} - {log}");
    }
}

/// Forwards a log record to the thread local test logger when the `test-utils`
/// feature is enabled on this crate. No-op otherwise.
#[inline]
pub fn capture_log(lvl: Level, log: fmt::Arguments, file: &str, line: u32) {
    #[cfg(feature = "test-utils")]
    test_logger::print_log(lvl, log, file, line);
    #[cfg(not(feature = "test-utils"))]
    let _ = (lvl, log, file, line);
}

#[macro_export]
macro_rules! apm_debug {
    // apm_debug!("swept {} settings", n)
    ($($arg:tt)+) => {
      $crate::apm_log!($crate::log::Level::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! apm_info {
  ($($arg:tt)+) => {
    $crate::apm_log!($crate::log::Level::Info, $($arg)*)
  };
}

#[macro_export]
macro_rules! apm_warn {
  ($($arg:tt)+) => {
    $crate::apm_log!($crate::log::Level::Warn, $($arg)*)
  };
}

#[macro_export]
macro_rules! apm_error {
  ($($arg:tt)+) => {
    $crate::apm_log!($crate::log::Level::Error, $($arg)*)
  };
}

#[macro_export]
macro_rules! apm_log {
    ($lvl:expr, $first:expr, $($rest:tt)*) => {{
      let lvl = $lvl;
      let loc = std::panic::Location::caller();
      if lvl <= $crate::log::max_level() {
        $crate::log::print_log(lvl, format_args!($first, $($rest)*), loc.file(), loc.line());
      }
      $crate::log::capture_log(lvl, format_args!($first, $($rest)*), loc.file(), loc.line());
    }};

    ($lvl:expr, $first:expr) => {
      $crate::apm_log!($lvl, $first,)
    };
}
