//! Message handling error types
//!
//! Queue handlers return [`TaskError`] so the consume loop can tell a failure
//! that is worth redelivering (broker hiccup, database timeout) from one that
//! will fail the same way every time (unknown video, malformed payload, a
//! video whose processing has already been recorded as failed).

use std::fmt;

/// Handler error tagged with whether the message should be redelivered
#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Error that must not be redelivered. The consume loop dead-letters the message.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Error that should be redelivered after the queue's backoff.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    /// Plain errors are treated as transient
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

/// Extension trait for marking a `Result` as unrecoverable on error
pub trait TaskResultExt<T> {
    fn unrecoverable(self) -> Result<T, TaskError>;
}

impl<T, E: Into<anyhow::Error>> TaskResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, TaskError> {
        self.map_err(|e| TaskError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = TaskError::unrecoverable(anyhow::anyhow!("video not found"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("video not found"));
    }

    #[test]
    fn test_from_anyhow_is_recoverable() {
        let err: TaskError = anyhow::anyhow!("connection reset").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("bad payload"));
        let err = result.unrecoverable().unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let wrapped: anyhow::Error = TaskError::unrecoverable(anyhow::anyhow!("x")).into();
        let task_err = wrapped.downcast_ref::<TaskError>().unwrap();
        assert!(!task_err.is_recoverable());
    }
}
