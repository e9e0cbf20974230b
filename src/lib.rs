//! # taskstream
//!
//! Run-once streaming tasks: a producer callback deposits any number of
//! values into a bounded or unbounded result channel while concurrent
//! consumers pull them in FIFO order.
//!
//! A [`StreamingTask`] is the streaming counterpart of a single-shot
//! future. Its producer runs exactly once and streams intermediate results
//! instead of returning one value; the stream ends with a sticky terminal
//! marker, either normal end-of-stream or a failure carrying the cause.
//! Each value is delivered to exactly one consumer, so a group of workers
//! can share one task as a work queue. The task is cancellable at any
//! point, and cancellation supersedes anything still queued.
//!
//! ## Quick start
//!
//! ```rust
//! use taskstream::{BoxError, Inlet, StreamingExecutor, TokioExecutor};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = StreamingExecutor::new(TokioExecutor::current());
//! let task = executor.submit(|inlet: Inlet<String>| async move {
//!     inlet.put("Hello!".to_string()).await?;
//!     inlet.put("Goodbye!".to_string()).await?;
//!     Ok::<(), BoxError>(())
//! })?;
//!
//! while let Some(value) = task.next().await? {
//!     println!("{value}");
//! }
//! assert!(task.is_done());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Result channel shared by a task's producer and consumer facets.
pub mod channel;
/// Error types for depositing, pulling, and scheduling.
pub mod error;
/// Execution seam and the submission facade.
pub mod executor;
/// The producer callback trait.
pub mod producer;
/// Streaming task lifecycle and consumer interface.
pub mod task;

pub use channel::Inlet;
pub use error::{BoxError, FailureCause, NextError, ProducerPanic, PutError, RejectedError};
pub use executor::{Executor, RunFuture, StreamingExecutor, TokioExecutor};
pub use producer::Producer;
pub use task::{StreamingTask, TaskConfig, TaskState};
