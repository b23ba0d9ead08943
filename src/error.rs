use thiserror::Error;

/// Error taxonomy for the message queue API.
///
/// Every operation surfaces one of these; the `ffi` module collapses
/// all of them to `-1` at the raw integer-return boundary.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("corrupt handle: {0}")]
    CorruptHandle(String),

    #[error("queue not found: {0}")]
    NotFound(String),

    #[error("timed out waiting for queue")]
    TimedOut,

    #[error("underlying OS primitive failed: {0}")]
    Generic(String),
}

impl QueueError {
    pub fn generic(context: impl Into<String>) -> Self {
        QueueError::Generic(context.into())
    }
}

impl From<std::io::Error> for QueueError {
    fn from(err: std::io::Error) -> Self {
        QueueError::Generic(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
