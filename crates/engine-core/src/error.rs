use thiserror::Error;

/// Result of running an operation under the retry policy.
#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The error was considered fatal and bubbled up immediately.
    #[error(transparent)]
    Fatal(E),

    /// The error was retryable, but the configured attempts were exhausted.
    #[error("gave up after {attempts} attempts: {source}")]
    AttemptsExceeded {
        attempts: usize,
        #[source]
        source: E,
    },

    #[error("cancelled while waiting to retry")]
    Cancelled,
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// The underlying error, if the operation failed on its own.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Fatal(err) | RetryError::AttemptsExceeded { source: err, .. } => Some(err),
            RetryError::Cancelled => None,
        }
    }
}
