//! Process-wide sink for the crate's diagnostics.
//!
//! Internally the crate logs through the [`log`] facade, on targets under
//! `pembroke::`. [`register_handler`] installs a small `log::Log` bridge the
//! first time it is called and forwards every `pembroke` record to the
//! registered handler. Records from other crates are ignored.
//!
//! Until a handler is registered, messages are discarded. Registering again
//! swaps the handler atomically, so it is safe to do while other threads log.
//!
//! Applications that already use their own `log` implementation do not need
//! this module at all: the crate's records reach that logger directly.

use crate::error::LoggingError;

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Severity of a message delivered to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// A failure of the OS backend itself.
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Critical => "critical",
        };
        f.write_str(name)
    }
}

type Handler = Arc<dyn Fn(Level, &str) + Send + Sync>;

const TARGET_PREFIX: &str = "pembroke";
const CRITICAL_TARGET: &str = "pembroke::critical";

static HANDLER: RwLock<Option<Handler>> = RwLock::new(None);
static BRIDGE_INSTALLED: OnceLock<bool> = OnceLock::new();

/// Routes every message of the crate to `handler`.
///
/// Replaces any previously registered handler. There is no way to remove
/// it; register a no-op closure to silence the crate again.
///
/// # Errors
///
/// Returns [`LoggingError::LoggerAlreadySet`] if another `log`
/// implementation was installed first.
///
/// # Examples
///
/// ```rust
/// use pembroke::logging::{self, Level};
///
/// logging::register_handler(|level: Level, message: &str| {
///     if level >= Level::Warn {
///         eprintln!("[pembroke {level}] {message}");
///     }
/// })
/// .expect("no other logger installed");
/// ```
pub fn register_handler<F>(handler: F) -> Result<(), LoggingError>
where
    F: Fn(Level, &str) + Send + Sync + 'static,
{
    let installed = *BRIDGE_INSTALLED.get_or_init(|| match log::set_logger(&Bridge) {
        Ok(()) => {
            log::set_max_level(log::LevelFilter::Trace);
            true
        }
        Err(_) => false,
    });

    if !installed {
        return Err(LoggingError::LoggerAlreadySet);
    }

    *HANDLER.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    Ok(())
}

fn level_of(record: &log::Record<'_>) -> Level {
    if record.target() == CRITICAL_TARGET {
        return Level::Critical;
    }

    match record.level() {
        log::Level::Trace => Level::Trace,
        log::Level::Debug => Level::Debug,
        log::Level::Info => Level::Info,
        log::Level::Warn => Level::Warn,
        log::Level::Error => Level::Error,
    }
}

struct Bridge;

impl log::Log for Bridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.target().starts_with(TARGET_PREFIX)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Cloned out so the handler may itself log or re-register.
        let handler = HANDLER
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(handler) = handler else {
            return;
        };

        let level = level_of(record);
        match record.args().as_str() {
            Some(message) => handler(level, message),
            None => handler(level, &record.args().to_string()),
        }
    }

    fn flush(&self) {}
}
