//! Run-once streaming tasks and their consumer interface.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::stream::{self, Stream};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::channel::{Inlet, ResultChannel, Terminal};
use crate::error::{NextError, ProducerPanic};
use crate::producer::Producer;

/// Lifecycle phase of a [`StreamingTask`].
///
/// Legal transitions: `Pending → Running → Completed | Failed`, plus
/// `Pending | Running → Cancelled`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskState {
    /// Constructed, not yet run.
    Pending,
    /// The producer callback is executing.
    Running,
    /// The callback returned normally; the stream ends once the queue drains.
    Completed,
    /// The callback returned an error or panicked.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl TaskState {
    /// Whether this phase is terminal (completed, failed, or cancelled).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Configuration for a [`StreamingTask`].
#[derive(Clone, Debug, Default)]
pub struct TaskConfig {
    capacity: Option<usize>,
    name: Option<String>,
}

impl TaskConfig {
    /// The default configuration: unbounded queue, anonymous task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the result queue to `capacity` values, clamped to at least 1.
    /// A producer depositing into a full queue suspends until a consumer
    /// takes a value.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    /// Names the task in log events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The configured queue bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// The configured task name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A run-once task whose producer callback streams values to consumers.
///
/// Cloning is shallow: every clone shares the same channel and lifecycle, so
/// one clone can drive [`run`](StreamingTask::run) while others consume or
/// cancel. The producer callback is consumed by its single execution.
pub struct StreamingTask<T> {
    channel: Arc<ResultChannel<T>>,
    producer: Arc<Mutex<Option<Box<dyn Producer<T>>>>>,
    name: Option<Arc<str>>,
}

impl<T: 'static> StreamingTask<T> {
    /// Creates a task with the default configuration (unbounded queue).
    pub fn new(producer: impl Producer<T>) -> Self {
        Self::with_config(producer, TaskConfig::default())
    }

    /// Creates a task from `config`.
    pub fn with_config(producer: impl Producer<T>, config: TaskConfig) -> Self {
        Self {
            channel: Arc::new(ResultChannel::new(config.capacity)),
            producer: Arc::new(Mutex::new(Some(Box::new(producer)))),
            name: config.name.map(Arc::from),
        }
    }

    fn log_name(&self) -> &str {
        self.name.as_deref().unwrap_or("task")
    }

    /// Executes the producer callback, at most once across all clones.
    ///
    /// On a pending task this runs the callback to completion and records
    /// the terminal marker: end-of-stream on `Ok`, failure on `Err` or
    /// panic. On a task already cancelled it returns immediately and the
    /// callback is never invoked. Duplicate calls are no-ops.
    ///
    /// If the task is cancelled while the callback runs, the cancellation
    /// stands: no terminal marker replaces it and consumers keep observing
    /// the cancelled state.
    pub async fn run(&self) {
        if let Err(phase) = self.channel.try_start() {
            debug!(task = self.log_name(), ?phase, "run skipped");
            return;
        }
        let producer = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(producer) = producer else {
            debug!(task = self.log_name(), "producer already consumed");
            return;
        };

        debug!(task = self.log_name(), "producer started");
        let inlet = Inlet::new(Arc::clone(&self.channel));
        let outcome = AssertUnwindSafe(producer.produce(inlet))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                debug!(task = self.log_name(), "producer finished");
                self.channel.close(Terminal::End);
            }
            Ok(Err(cause)) => {
                warn!(task = self.log_name(), %cause, "producer failed");
                self.channel.close(Terminal::Failed(Arc::from(cause)));
            }
            Err(payload) => {
                let panic = ProducerPanic::from_payload(payload);
                error!(
                    task = self.log_name(),
                    message = panic.message(),
                    "producer panicked"
                );
                self.channel.close(Terminal::Failed(Arc::new(panic)));
            }
        }
    }

    /// Moves the task to `Cancelled` unless it already reached a terminal
    /// phase. Returns whether this call performed the transition.
    ///
    /// On a pending task the callback will never be invoked. On a running
    /// task with `interrupt` set, the interruption signal trips: suspended
    /// deposits fail with [`PutError::Interrupted`](crate::error::PutError)
    /// and the callback can observe [`Inlet::is_interrupted`]. Without
    /// `interrupt` a running callback keeps executing, but nothing it
    /// deposits is ever delivered.
    ///
    /// Cancelling a completed or failed task returns `false` and leaves
    /// queued values consumable.
    pub fn cancel(&self, interrupt: bool) -> bool {
        let cancelled = self.channel.cancel(interrupt);
        if cancelled {
            debug!(task = self.log_name(), interrupt, "task cancelled");
        }
        cancelled
    }

    /// The task's current lifecycle phase.
    pub fn state(&self) -> TaskState {
        self.channel.phase()
    }

    /// Whether the task was cancelled before completing.
    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Whether the task reached any terminal phase. The queue may still
    /// hold undelivered values.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Pulls the next value, suspending until one is deposited or the task
    /// reaches a terminal phase.
    ///
    /// Returns `Ok(Some(value))` for a delivered value and `Ok(None)` once
    /// the stream ended normally (sticky). Fails with
    /// [`NextError::Failed`] once the producer failed (sticky, the same
    /// shared cause for every consumer) and with [`NextError::Cancelled`]
    /// once the task is cancelled, even with values still queued.
    ///
    /// Concurrent callers compete for values: each deposited value is
    /// delivered to exactly one of them.
    ///
    /// Cancel-safe: dropping this future before completion never loses a
    /// value.
    pub async fn next(&self) -> Result<Option<T>, NextError> {
        self.channel.take_next(None).await
    }

    /// Like [`next`](StreamingTask::next), but fails with
    /// [`NextError::Timeout`] when no value or terminal marker arrives
    /// within `timeout`. A timeout never consumes a value; one too large
    /// for the clock to represent waits unboundedly.
    pub async fn next_timeout(&self, timeout: Duration) -> Result<Option<T>, NextError> {
        self.channel
            .take_next(Instant::now().checked_add(timeout))
            .await
    }

    /// Adapts the handle into a stream of pull results.
    ///
    /// The stream yields each delivered value as `Ok`, ends after
    /// end-of-stream, and yields a terminal failure or cancellation exactly
    /// once before ending instead of repeating the sticky error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, NextError>> {
        stream::unfold(Some(self), |task| async move {
            let task = task?;
            match task.next().await {
                Ok(Some(value)) => Some((Ok(value), Some(task))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}

impl<T> Clone for StreamingTask<T> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            producer: Arc::clone(&self.producer),
            name: self.name.clone(),
        }
    }
}

impl<T: 'static> std::fmt::Debug for StreamingTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingTask")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
