use thiserror::Error;

use crate::context::SessionId;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the configuration and collaborator-facing calls.
///
/// Correlation itself never fails: every call to
/// [`CorrelationEngine::correlate`](crate::CorrelationEngine::correlate)
/// yields a context or "no correlation".
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration text could not be parsed.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// No live session carries this id (never created, or already evicted).
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// The session is already bound to a different application context.
    #[error("Session {session_id} already bound to application context {bound}, refusing {requested}")]
    AppContextConflict {
        session_id: SessionId,
        bound: String,
        requested: String,
    },
}

impl Error {
    /// Shorthand for building an [`Error::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }
}
