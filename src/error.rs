//! Error types for depositing, pulling, and scheduling streaming tasks.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by producer callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure cause recorded in a stream's terminal marker.
///
/// Reference counted because every consumer pulling after the failure
/// receives a handle to the same underlying error.
pub type FailureCause = Arc<dyn std::error::Error + Send + Sync>;

/// Errors returned when pulling the next value from a streaming task.
#[derive(Debug, Clone, Error)]
pub enum NextError {
    /// The task was cancelled. Queued but undelivered values are suppressed
    /// and every subsequent pull reports this same error.
    #[error("task was cancelled")]
    Cancelled,

    /// The producer callback failed. The shared cause is observed by every
    /// consumer that pulls after the failure.
    #[error("producer failed: {0}")]
    Failed(#[source] FailureCause),

    /// No value or terminal marker arrived within the requested timeout.
    #[error("timed out waiting for the next value")]
    Timeout,
}

/// Errors returned when depositing a value through an
/// [`Inlet`](crate::channel::Inlet).
///
/// Every variant hands the rejected value back to the caller.
#[derive(Debug, Error)]
pub enum PutError<T> {
    /// The task was cancelled with interruption; the deposit was refused.
    #[error("deposit interrupted: task was cancelled")]
    Interrupted(T),

    /// Queue capacity did not free up within the requested timeout.
    #[error("timed out depositing a value")]
    Timeout(T),

    /// The stream already carries its terminal marker; no further value can
    /// ever be delivered.
    #[error("stream is closed")]
    Closed(T),
}

impl<T> PutError<T> {
    /// Recovers the value that could not be deposited.
    pub fn into_inner(self) -> T {
        match self {
            Self::Interrupted(value) | Self::Timeout(value) | Self::Closed(value) => value,
        }
    }
}

/// The executor refused to schedule a task.
#[derive(Debug, Clone, Error)]
#[error("task rejected by executor: {reason}")]
pub struct RejectedError {
    /// Why scheduling was refused.
    pub reason: String,
}

/// A producer callback panicked; the payload survives as a message.
#[derive(Debug, Error)]
#[error("producer panicked: {message}")]
pub struct ProducerPanic {
    message: String,
}

impl ProducerPanic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "opaque panic payload".to_string()
        };
        Self { message }
    }

    /// The panic message, when one could be recovered from the payload.
    pub fn message(&self) -> &str {
        &self.message
    }
}
