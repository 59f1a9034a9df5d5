//! Global driver log
//!
//! Fixed-size in-memory log ring for environments without a console. Entries
//! are a static message plus one numeric parameter (port number, register
//! value, queue index), which covers everything the driver wants to say
//! without needing a formatter or an allocator.

use core::sync::atomic::{AtomicUsize, Ordering};

const MAX_LOG_ENTRIES: usize = 128;

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One log entry: level, static message, numeric parameter
#[derive(Debug, Clone, Copy)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: &'static str,
    pub param: u64,
}

static mut LOG_BUFFER: [Option<LogEntry>; MAX_LOG_ENTRIES] = [None; MAX_LOG_ENTRIES];
static LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

pub fn log(level: LogLevel, message: &'static str, param: u64) {
    let idx = LOG_COUNT.fetch_add(1, Ordering::SeqCst);
    if idx < MAX_LOG_ENTRIES {
        unsafe {
            LOG_BUFFER[idx] = Some(LogEntry {
                level,
                message,
                param,
            });
        }
    }
}

pub fn get_logs() -> &'static [Option<LogEntry>] {
    let count = LOG_COUNT.load(Ordering::SeqCst).min(MAX_LOG_ENTRIES);
    unsafe { &LOG_BUFFER[..count] }
}

pub fn log_count() -> usize {
    LOG_COUNT.load(Ordering::SeqCst).min(MAX_LOG_ENTRIES)
}

// Macros for easier logging
#[macro_export]
macro_rules! log_info {
    ($msg:expr) => {
        $crate::logger::log($crate::logger::LogLevel::Info, $msg, 0)
    };
    ($msg:expr, $param:expr) => {
        $crate::logger::log($crate::logger::LogLevel::Info, $msg, $param as u64)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($msg:expr) => {
        $crate::logger::log($crate::logger::LogLevel::Warn, $msg, 0)
    };
    ($msg:expr, $param:expr) => {
        $crate::logger::log($crate::logger::LogLevel::Warn, $msg, $param as u64)
    };
}

#[macro_export]
macro_rules! log_error {
    ($msg:expr) => {
        $crate::logger::log($crate::logger::LogLevel::Error, $msg, 0)
    };
    ($msg:expr, $param:expr) => {
        $crate::logger::log($crate::logger::LogLevel::Error, $msg, $param as u64)
    };
}
