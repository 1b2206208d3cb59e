//! Process-wide caption logging sink.
//!
//! The source keeps a static callback (`cea_log_callback`) plus a minimum level,
//! activated once per process and consulted from `cea_log()`. This module mirrors
//! that shape as a small trait, but defaults to forwarding through the `log`
//! facade so embedders who only want `env_logger`-style output don't need to wire
//! anything up themselves.

use std::sync::{Once, RwLock};

/// Mirrors the source's `cea_log_level` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    fn to_log_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error | LogLevel::Fatal => log::Level::Error,
        }
    }
}

/// A caller-supplied log sink, the Rust analogue of `cea_log_callback`.
pub trait CaptionLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Default sink: forwards to the `log` facade at the matching level.
struct FacadeLogger;

impl CaptionLogger for FacadeLogger {
    fn log(&self, level: LogLevel, message: &str) {
        log::log!(level.to_log_level(), "{message}");
        if matches!(level, LogLevel::Fatal) {
            panic!("libcea: fatal: {message}");
        }
    }
}

static INIT: Once = Once::new();
static SINK: RwLock<Option<Box<dyn CaptionLogger>>> = RwLock::new(None);
static MIN_LEVEL: RwLock<LogLevel> = RwLock::new(LogLevel::Info);

fn ensure_default() {
    INIT.call_once(|| {
        *SINK.write().unwrap() = Some(Box::new(FacadeLogger));
    });
}

/// Installs a custom process-wide log sink, mirroring `cea_log_activate`.
pub fn set_log_callback(sink: Box<dyn CaptionLogger>, min_level: LogLevel) {
    ensure_default();
    *SINK.write().unwrap() = Some(sink);
    *MIN_LEVEL.write().unwrap() = min_level;
}

pub(crate) fn cea_log(level: LogLevel, message: impl AsRef<str>) {
    ensure_default();
    let min = *MIN_LEVEL.read().unwrap();
    if level < min {
        return;
    }
    if let Some(sink) = SINK.read().unwrap().as_ref() {
        sink.log(level, message.as_ref());
    }
}

macro_rules! cea_debug {
    ($($arg:tt)*) => { $crate::logging::cea_log($crate::logging::LogLevel::Debug, format!($($arg)*)) };
}
macro_rules! cea_warn {
    ($($arg:tt)*) => { $crate::logging::cea_log($crate::logging::LogLevel::Warn, format!($($arg)*)) };
}

pub(crate) use cea_debug;
pub(crate) use cea_warn;
