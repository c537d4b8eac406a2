use crate::reactor::Feature;

use std::io;
use thiserror::Error;

/// Error returned when a reactor cannot be built.
///
/// This is the only error surfaced as a `Result` by the crate; every
/// operation on a built reactor reports failures as `false` and logs them.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The backend rejected a requested feature.
    #[error("unable to update reactor config for {0} support")]
    Unsupported(Feature),

    /// The OS-level loop context could not be created.
    #[error("unable to construct reactor loop context: {0}")]
    Context(#[source] io::Error),
}

/// Error returned by [`register_handler`](crate::logging::register_handler).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggingError {
    /// Another `log` implementation already owns the global logger.
    #[error("a global logger is already installed")]
    LoggerAlreadySet,
}
