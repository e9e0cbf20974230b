//! Execution seam and submission facade for streaming tasks.

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::RejectedError;
use crate::producer::Producer;
use crate::task::{StreamingTask, TaskConfig};

/// A boxed task-run future, as handed to an [`Executor`].
pub type RunFuture = BoxFuture<'static, ()>;

/// Minimal scheduling capability: drive a future to completion off the
/// caller's control flow.
///
/// Implementations must either poll an accepted future to completion
/// exactly once or refuse it outright with [`RejectedError`]; dropping an
/// accepted future unpolled would strand the task's consumers in the
/// pending phase.
pub trait Executor: Send + Sync {
    /// Schedules `fut` for execution.
    fn execute(&self, fut: RunFuture) -> Result<(), RejectedError>;
}

/// [`Executor`] backed by a tokio runtime handle. Accepted futures are
/// spawned detached.
#[derive(Clone, Debug)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Wraps an explicit runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Wraps the ambient runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, as [`Handle::current`]
    /// does.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, fut: RunFuture) -> Result<(), RejectedError> {
        self.handle.spawn(fut);
        Ok(())
    }
}

/// Wraps any [`Executor`] with the ability to submit streaming producers.
///
/// The facade remains an [`Executor`] itself, forwarding `execute` to the
/// wrapped one unchanged, and adds [`submit`](StreamingExecutor::submit):
/// build a [`StreamingTask`] from the facade's [`TaskConfig`], schedule its
/// run on the wrapped executor, and hand back the task as the consumer
/// handle.
#[derive(Clone, Debug)]
pub struct StreamingExecutor<E = TokioExecutor> {
    inner: E,
    config: TaskConfig,
}

impl<E: Executor> StreamingExecutor<E> {
    /// Wraps `inner` with the default task configuration.
    pub fn new(inner: E) -> Self {
        Self::with_config(inner, TaskConfig::default())
    }

    /// Wraps `inner`; submitted tasks are built from `config`.
    pub fn with_config(inner: E, config: TaskConfig) -> Self {
        Self { inner, config }
    }

    /// The configuration applied to submitted tasks.
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Builds a streaming task around `producer`, schedules its run on the
    /// wrapped executor, and returns the consumer handle.
    ///
    /// A producer value always exists here, so the only failure is
    /// [`RejectedError`] when the wrapped executor refuses scheduling; the
    /// producer is dropped unrun in that case.
    pub fn submit<T, P>(&self, producer: P) -> Result<StreamingTask<T>, RejectedError>
    where
        T: Send + 'static,
        P: Producer<T>,
    {
        let task = StreamingTask::with_config(producer, self.config.clone());
        let runner = task.clone();
        self.inner
            .execute(Box::pin(async move { runner.run().await }))?;
        debug!(
            task = self.config.name().unwrap_or("task"),
            "streaming task submitted"
        );
        Ok(task)
    }
}

impl<E: Executor> Executor for StreamingExecutor<E> {
    fn execute(&self, fut: RunFuture) -> Result<(), RejectedError> {
        self.inner.execute(fut)
    }
}
