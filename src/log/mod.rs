//! Where the crate's diagnostic messages go. Decoding never depends on it: with logging off (the
//! default) every property decodes exactly as it would with logging on.
//!
//! The five logging macros `error!`, `warn!`, `info!`, `debug!` and `trace!` are re-exported for
//! convenience.
//!
//! Two levels are configured:
//!
//!  - the global level, set with `set_log_level()`, `enable_logging()` or `disable_logging()`;
//!  - the decode level, set with `set_decode_level()` or through
//!    `DecodeOptions::decode_log_level`. It applies to the modules in `DECODE_TARGETS`, which log
//!    once per decoded property per tick, and it is capped by the global level.
//!
//! ```rust
//! use tickprop::log::{set_decode_level, set_log_level, LevelFilter};
//!
//! set_log_level(LevelFilter::Trace);
//! // Per-tick decode lines only when a decode fails.
//! set_decode_level(LevelFilter::Debug);
//! ```
#[cfg(all(not(target_arch = "wasm32"), feature = "logging"))]
mod standard_logger;

#[cfg(not(all(not(target_arch = "wasm32"), feature = "logging")))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};

#[cfg(all(not(target_arch = "wasm32"), feature = "logging"))]
use log4rs::Handle;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

/// Module paths that emit a message for every decoded property.
pub const DECODE_TARGETS: [&str; 2] = ["tickprop::property", "tickprop::unpacker"];

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;
// Decode failures are reported, successful decodes are not.
const DEFAULT_DECODE_LEVEL: LevelFilter = LevelFilter::Debug;

static LOG_SETTINGS: LazyLock<Mutex<LogSettings>> = LazyLock::new(Mutex::default);

/// Serializes tests that touch the global log settings.
#[cfg(test)]
pub(crate) static LOG_TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

#[derive(Debug)]
pub(in crate::log) struct LogSettings {
    level: LevelFilter,
    decode_level: LevelFilter,

    #[cfg(all(not(target_arch = "wasm32"), feature = "logging"))]
    handle: Option<Handle>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            decode_level: DEFAULT_DECODE_LEVEL,

            #[cfg(all(not(target_arch = "wasm32"), feature = "logging"))]
            handle: None,
        }
    }
}

impl LogSettings {
    /// The filter actually installed for `DECODE_TARGETS`.
    pub(in crate::log) fn effective_decode_level(&self) -> LevelFilter {
        self.decode_level.min(self.level)
    }

    fn set_levels(&mut self, level: LevelFilter, decode_level: LevelFilter) {
        if self.level == level && self.decode_level == decode_level && self.is_applied() {
            return;
        }
        self.level = level;
        self.decode_level = decode_level;
        self.apply();
    }

    #[cfg(all(not(target_arch = "wasm32"), feature = "logging"))]
    fn is_applied(&self) -> bool {
        self.handle.is_some()
    }

    #[cfg(not(all(not(target_arch = "wasm32"), feature = "logging")))]
    fn is_applied(&self) -> bool {
        false
    }
}

fn settings() -> MutexGuard<'static, LogSettings> {
    LOG_SETTINGS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turns on every message. Equivalent to `set_log_level(LevelFilter::Trace)`; the decode level
/// still applies.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Turns off every message, decode messages included.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

pub fn set_log_level(level: LevelFilter) {
    let mut settings = settings();
    let decode_level = settings.decode_level;
    settings.set_levels(level, decode_level);
}

/// Sets the level for `DECODE_TARGETS`. Messages above the global level stay filtered.
pub fn set_decode_level(level: LevelFilter) {
    let mut settings = settings();
    let global = settings.level;
    settings.set_levels(global, level);
}

#[must_use]
pub fn log_level() -> LevelFilter {
    settings().level
}

#[must_use]
pub fn decode_level() -> LevelFilter {
    settings().decode_level
}
