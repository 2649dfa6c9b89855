//! Logging policy layer.
//!
//! The actual log sink (ring buffer + UART mirror) lives in `lib::printk`;
//! this module just exposes named policies that pick a verbosity level, the
//! way boot-time configuration selects one in `init::phases`.

use crate::lib::printk::LogLevel;
use core::sync::atomic::{AtomicU8, Ordering};

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

pub fn set_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn get_level() -> LogLevel {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

#[inline]
pub fn is_enabled(level: LogLevel) -> bool {
    (level as u8) <= (get_level() as u8)
}

pub mod policy {
    use super::*;

    pub const PRODUCTION_LEVEL: LogLevel = LogLevel::Warn;
    pub const DEVELOPMENT_LEVEL: LogLevel = LogLevel::Debug;
    pub const TESTING_LEVEL: LogLevel = LogLevel::Debug;

    pub fn set_production() {
        set_level(PRODUCTION_LEVEL);
        crate::info!("production logging policy active (WARN+)");
    }

    pub fn set_development() {
        set_level(DEVELOPMENT_LEVEL);
        crate::info!("development logging policy active (DEBUG+)");
    }

    pub fn set_testing() {
        set_level(TESTING_LEVEL);
        crate::info!("testing logging policy active (DEBUG+)");
    }
}
